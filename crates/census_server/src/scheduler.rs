//! Periodic scan trigger.
//!
//! A spawned task sleeps until the next cadence point and triggers the scan
//! action asynchronously, so scheduled runs are tracked in the job registry
//! like any other trigger. Executor isolation guarantees a failing run never
//! takes this loop down.

use census_config::ScheduleConfig;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Offset, Utc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::actions::{Action, ActionExecutor, TriggerMode, Triggered};

/// Spawn the periodic trigger. Returns `None` when scheduling is disabled.
pub fn spawn(executor: ActionExecutor, config: ScheduleConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("scheduler disabled");
        return None;
    }
    Some(tokio::spawn(run(executor, config)))
}

async fn run(executor: ActionExecutor, config: ScheduleConfig) {
    info!(
        interval_minutes = config.interval_minutes,
        daily_at = config.daily_at.as_deref().unwrap_or("-"),
        utc_offset_hours = config.utc_offset_hours,
        "scheduler started"
    );
    loop {
        let delay = delay_until_next(&config, Utc::now());
        tokio::time::sleep(delay).await;
        match executor.trigger(Action::Scan, TriggerMode::Async).await {
            Triggered::Queued { id } => info!(job_id = %id, "scheduled scan queued"),
            Triggered::Completed(job) => info!(job_id = %job.id, "scheduled scan finished"),
        }
    }
}

/// Time to sleep from `now` until the next cadence point.
///
/// `daily_at` fires once per day at the given wall-clock time in the
/// configured fixed UTC offset; otherwise the fixed interval applies.
pub fn delay_until_next(config: &ScheduleConfig, now: DateTime<Utc>) -> std::time::Duration {
    let Some((hour, minute)) = config.daily_at_hm() else {
        return std::time::Duration::from_secs(config.interval_minutes.max(1) * 60);
    };

    let offset = chrono::FixedOffset::east_opt(i32::from(config.utc_offset_hours) * 3600)
        .unwrap_or_else(|| Utc.fix());
    let local_now = now.with_timezone(&offset).naive_local();
    // Validated at config load; midnight only on a bad handwritten config.
    let target_time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();

    let mut next = local_now.date().and_time(target_time);
    if next <= local_now {
        next = next + ChronoDuration::days(1);
    }
    (next - local_now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}
