//! Remote snapshot upload with interval throttling.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use census_config::RemoteConfig;

/// Name of the persisted upload marker in the output directory.
pub const UPLOAD_MARKER_NAME: &str = ".last_upload";

const SECONDS_PER_DAY: u64 = 86_400;

/// Overwrite-style put into remote object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> anyhow::Result<()>;
}

/// Persisted gate deciding how often the latest snapshot is pushed.
///
/// The marker file holds one textual epoch-seconds value; its absence means
/// "never uploaded".
pub struct UploadThrottle {
    marker_path: PathBuf,
}

impl UploadThrottle {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            marker_path: output_dir.join(UPLOAD_MARKER_NAME),
        }
    }

    /// An upload is due when no interval is configured, the marker is absent
    /// or unreadable, or the interval has elapsed since the recorded upload.
    pub fn is_due(&self, interval_days: Option<u32>, now: SystemTime) -> bool {
        let Some(interval_days) = interval_days else {
            return true;
        };
        let Ok(text) = fs::read_to_string(&self.marker_path) else {
            return true;
        };
        let Ok(marker_secs) = text.trim().parse::<f64>() else {
            return true;
        };
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        now_secs - marker_secs >= (u64::from(interval_days) * SECONDS_PER_DAY) as f64
    }

    /// Record a successful upload at `now`.
    pub fn record(&self, now: SystemTime) -> std::io::Result<()> {
        let secs = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        fs::write(&self.marker_path, secs.to_string())
    }
}

/// Result of one upload opportunity. Failure is reported here, never raised:
/// an upload problem must not fail the enclosing action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Disabled,
    MissingLatest,
    Throttled,
    Uploaded { key: String },
    Failed { message: String },
}

impl UploadOutcome {
    pub fn describe(&self) -> String {
        match self {
            UploadOutcome::Disabled => "disabled".to_string(),
            UploadOutcome::MissingLatest => "skipped, latest snapshot missing".to_string(),
            UploadOutcome::Throttled => "skipped, interval not elapsed".to_string(),
            UploadOutcome::Uploaded { key } => format!("uploaded as {key}"),
            UploadOutcome::Failed { message } => format!("failed: {message}"),
        }
    }
}

/// Drives the throttle decision and the store call for the latest snapshot.
pub struct Uploader {
    config: RemoteConfig,
    throttle: UploadThrottle,
    store: Option<Arc<dyn ObjectStore>>,
}

impl Uploader {
    pub fn new(config: RemoteConfig, output_dir: &Path, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            throttle: UploadThrottle::new(output_dir),
            config,
            store,
        }
    }

    /// Target key: configured prefix joined with the object name.
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}",
            self.config.prefix.trim_end_matches('/'),
            self.config.latest_object
        )
        .trim_start_matches('/')
        .to_string()
    }

    /// Push the latest snapshot if due. Never fails the caller; on failure
    /// the marker is left untouched so the next opportunity retries.
    pub async fn upload_latest(&self, latest_path: &Path) -> UploadOutcome {
        if !self.config.enabled {
            return UploadOutcome::Disabled;
        }
        let Some(store) = self.store.as_ref() else {
            return UploadOutcome::Disabled;
        };

        if !latest_path.exists() {
            tracing::warn!(path = %latest_path.display(), "latest snapshot missing, skipping upload");
            return UploadOutcome::MissingLatest;
        }

        if !self
            .throttle
            .is_due(self.config.upload_interval_days, SystemTime::now())
        {
            tracing::info!("upload interval not elapsed, skipping upload");
            return UploadOutcome::Throttled;
        }

        let body = match fs::read(latest_path) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(path = %latest_path.display(), error = %err, "failed to read latest snapshot");
                return UploadOutcome::Failed {
                    message: err.to_string(),
                };
            }
        };

        let key = self.object_key();
        match store.put_object(&key, body).await {
            Ok(()) => {
                if let Err(err) = self.throttle.record(SystemTime::now()) {
                    tracing::warn!(error = %err, "uploaded, but failed to persist upload marker");
                }
                tracing::info!(key = %key, "latest snapshot uploaded");
                UploadOutcome::Uploaded { key }
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(key = %key, error = %message, "snapshot upload failed");
                UploadOutcome::Failed { message }
            }
        }
    }
}

/// S3-compatible object store client. Custom endpoints (MinIO, OSS and
/// friends) are supported via `remote.endpoint` with path-style addressing.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the remote-store configuration. Credentials,
    /// region and bucket are required (enforced at config load).
    pub fn from_config(config: &RemoteConfig) -> anyhow::Result<Self> {
        let access_key_id = config
            .access_key_id
            .clone()
            .context("remote.access_key_id is not set")?;
        let access_key_secret = config
            .access_key_secret
            .clone()
            .context("remote.access_key_secret is not set")?;
        let region = config.region.clone().context("remote.region is not set")?;
        let bucket = config.bucket.clone().context("remote.bucket is not set")?;

        let credentials =
            Credentials::new(access_key_id, access_key_secret, None, None, "census-config");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| anyhow::anyhow!("{}", aws_sdk_s3::error::DisplayErrorContext(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        puts: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put_object(&self, key: &str, body: Vec<u8>) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("remote store unavailable");
            }
            self.puts
                .lock()
                .expect("puts lock")
                .push((key.to_string(), body));
            Ok(())
        }
    }

    fn remote_config(enabled: bool, interval_days: Option<u32>) -> RemoteConfig {
        RemoteConfig {
            enabled,
            access_key_id: Some("id".into()),
            access_key_secret: Some("secret".into()),
            region: Some("us-east-1".into()),
            endpoint: None,
            bucket: Some("snapshots".into()),
            prefix: "inventory/".into(),
            latest_object: "scan_latest.csv".into(),
            upload_interval_days: interval_days,
        }
    }

    #[test]
    fn due_when_interval_unset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let throttle = UploadThrottle::new(temp.path());
        assert!(throttle.is_due(None, SystemTime::now()));
    }

    #[test]
    fn due_when_marker_absent_or_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let throttle = UploadThrottle::new(temp.path());
        assert!(throttle.is_due(Some(7), SystemTime::now()));

        fs::write(temp.path().join(UPLOAD_MARKER_NAME), "not-a-number").expect("write marker");
        assert!(throttle.is_due(Some(7), SystemTime::now()));
    }

    #[test]
    fn respects_the_configured_interval() {
        let temp = tempfile::tempdir().expect("tempdir");
        let throttle = UploadThrottle::new(temp.path());

        let now = SystemTime::now();
        throttle.record(now).expect("record");

        assert!(!throttle.is_due(Some(7), now + Duration::from_secs(6 * SECONDS_PER_DAY)));
        assert!(throttle.is_due(Some(7), now + Duration::from_secs(7 * SECONDS_PER_DAY)));
    }

    #[test]
    fn fractional_marker_values_parse() {
        // The marker may carry a fractional timestamp written by an earlier
        // deployment.
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(UPLOAD_MARKER_NAME), "1700000000.25\n").expect("write marker");

        let throttle = UploadThrottle::new(temp.path());
        let soon = UNIX_EPOCH + Duration::from_secs(1_700_000_000 + SECONDS_PER_DAY - 60);
        let later = UNIX_EPOCH + Duration::from_secs(1_700_000_001 + SECONDS_PER_DAY);
        assert!(!throttle.is_due(Some(1), soon));
        assert!(throttle.is_due(Some(1), later));
    }

    #[tokio::test]
    async fn disabled_remote_skips_silently() {
        let temp = tempfile::tempdir().expect("tempdir");
        let uploader = Uploader::new(remote_config(false, None), temp.path(), None);
        let outcome = uploader.upload_latest(&temp.path().join("latest.csv")).await;
        assert_eq!(outcome, UploadOutcome::Disabled);
    }

    #[tokio::test]
    async fn missing_latest_skips_without_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::new(remote_config(true, None), temp.path(), Some(store.clone()));

        let outcome = uploader.upload_latest(&temp.path().join("latest.csv")).await;
        assert_eq!(outcome, UploadOutcome::MissingLatest);
        assert!(store.puts.lock().expect("puts lock").is_empty());
    }

    #[tokio::test]
    async fn successful_upload_records_the_marker() {
        let temp = tempfile::tempdir().expect("tempdir");
        let latest = temp.path().join("latest.csv");
        fs::write(&latest, b"kind,root_path,full_path,name\n").expect("write latest");

        let store = Arc::new(MemoryStore::default());
        let uploader = Uploader::new(remote_config(true, Some(7)), temp.path(), Some(store.clone()));

        let outcome = uploader.upload_latest(&latest).await;
        assert_eq!(
            outcome,
            UploadOutcome::Uploaded {
                key: "inventory/scan_latest.csv".to_string()
            }
        );
        assert!(temp.path().join(UPLOAD_MARKER_NAME).exists());

        let puts = store.puts.lock().expect("puts lock");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "inventory/scan_latest.csv");

        // A second opportunity inside the interval is throttled.
        drop(puts);
        let outcome = uploader.upload_latest(&latest).await;
        assert_eq!(outcome, UploadOutcome::Throttled);
    }

    #[tokio::test]
    async fn failed_upload_leaves_the_marker_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let latest = temp.path().join("latest.csv");
        fs::write(&latest, b"data").expect("write latest");

        let store = Arc::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        });
        let uploader = Uploader::new(remote_config(true, Some(7)), temp.path(), Some(store));

        let outcome = uploader.upload_latest(&latest).await;
        assert!(matches!(outcome, UploadOutcome::Failed { .. }));
        assert!(
            !temp.path().join(UPLOAD_MARKER_NAME).exists(),
            "marker must stay absent so the next opportunity retries"
        );
    }

    #[test]
    fn object_key_normalizes_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let uploader = Uploader::new(remote_config(true, None), temp.path(), None);
        assert_eq!(uploader.object_key(), "inventory/scan_latest.csv");

        let mut bare = remote_config(true, None);
        bare.prefix = String::new();
        let uploader = Uploader::new(bare, temp.path(), None);
        assert_eq!(uploader.object_key(), "scan_latest.csv");
    }
}
