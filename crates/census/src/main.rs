//! census - filesystem inventory snapshots with retention and remote push.
//!
//! Usage:
//!     census --config /config/census.toml serve
//!     census --config /config/census.toml scan

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use census_config::AppConfig;
use census_server::{api, scheduler, Action, ActionExecutor, AppContext, JobStatus, TriggerMode, Triggered};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "census", about = "Filesystem inventory snapshot service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "CENSUS_CONFIG", default_value = "/config/census.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP control surface and the periodic scheduler (default)
    Serve,
    /// Run one scan pipeline pass and exit
    Scan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A broken configuration must stop the process before it serves.
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    census_logging::init(&config.logging)?;

    let ctx = AppContext::new(config)?;
    let executor = ActionExecutor::new(ctx);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(executor).await,
        Command::Scan => scan_once(executor).await,
    }
}

async fn serve(executor: ActionExecutor) -> Result<()> {
    let config = Arc::clone(&executor.context().config);
    let scheduler_handle = scheduler::spawn(executor.clone(), config.schedule.clone());

    if !config.api.enabled {
        tracing::info!("api disabled, running the scheduler only");
        match scheduler_handle {
            Some(handle) => {
                handle.await.context("scheduler task aborted")?;
                Ok(())
            }
            None => anyhow::bail!("nothing to run: api and scheduler are both disabled"),
        }
    } else {
        let addr = format!("{}:{}", config.api.host, config.api.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind api listener on {addr}"))?;
        tracing::info!(addr = %addr, "api listening");
        axum::serve(listener, api::router(executor))
            .await
            .context("api server terminated")?;
        Ok(())
    }
}

async fn scan_once(executor: ActionExecutor) -> Result<()> {
    match executor.trigger(Action::Scan, TriggerMode::Sync).await {
        Triggered::Completed(job) => {
            if job.status == JobStatus::Error {
                anyhow::bail!("scan failed: {}", job.error);
            }
            tracing::info!(job_id = %job.id, "scan finished");
            Ok(())
        }
        Triggered::Queued { .. } => anyhow::bail!("synchronous trigger returned a queued job"),
    }
}
