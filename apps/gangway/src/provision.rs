use crate::storage::Credentials;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("malformed provisioning record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("provisioning yielded unusable credentials")]
    Unusable,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An out-of-band pairing capability: blocks until a human hands the
/// device fresh credentials. Deliberately has no timeout.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn pair(&self) -> Result<Credentials, ProvisionError>;
}

/// Pairing by dropped file: an operator writes a JSON credential record to
/// a well-known path (typically on the boot partition, reachable by
/// pulling the SD card or over a rescue channel), and the device consumes
/// it — read then remove — so one drop provisions one device once.
pub struct FileDropProvisioner {
    path: PathBuf,
    poll: Duration,
}

impl FileDropProvisioner {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            poll: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(path: PathBuf, poll: Duration) -> Self {
        Self { path, poll }
    }
}

#[async_trait]
impl Provisioner for FileDropProvisioner {
    async fn pair(&self) -> Result<Credentials, ProvisionError> {
        loop {
            match tokio::fs::read_to_string(&self.path).await {
                Ok(raw) => {
                    // Consume the drop before parsing so a bad record is
                    // not re-read forever.
                    if let Err(err) = tokio::fs::remove_file(&self.path).await {
                        warn!(path = %self.path.display(), error = %err, "failed to remove provisioning drop");
                    }
                    let creds: Credentials = serde_json::from_str(&raw)?;
                    if !creds.is_usable() {
                        return Err(ProvisionError::Unusable);
                    }
                    return Ok(creds);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    debug!(path = %self.path.display(), error = %err, "provisioning drop unreadable");
                }
            }
            tokio::time::sleep(self.poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_waits_for_drop_then_consumes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop.json");
        let provisioner =
            FileDropProvisioner::with_poll_interval(path.clone(), Duration::from_millis(5));

        let drop_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tokio::fs::write(
                &drop_path,
                serde_json::to_string(&Credentials::new("harbor", "hunter2")).unwrap(),
            )
            .await
            .unwrap();
        });

        let creds = tokio::time::timeout(Duration::from_secs(5), provisioner.pair())
            .await
            .expect("pairing should complete once the drop lands")
            .unwrap();
        writer.await.unwrap();

        assert_eq!(creds, Credentials::new("harbor", "hunter2"));
        assert!(!path.exists(), "the drop file must be consumed");
    }

    #[tokio::test]
    async fn malformed_drop_is_consumed_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let provisioner =
            FileDropProvisioner::with_poll_interval(path.clone(), Duration::from_millis(5));

        let result = tokio::time::timeout(Duration::from_secs(5), provisioner.pair())
            .await
            .unwrap();
        assert!(matches!(result, Err(ProvisionError::Malformed(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_credentials_in_drop_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop.json");
        tokio::fs::write(
            &path,
            serde_json::to_string(&Credentials::new("", "")).unwrap(),
        )
        .await
        .unwrap();
        let provisioner =
            FileDropProvisioner::with_poll_interval(path.clone(), Duration::from_millis(5));

        let result = tokio::time::timeout(Duration::from_secs(5), provisioner.pair())
            .await
            .unwrap();
        assert!(matches!(result, Err(ProvisionError::Unusable)));
    }
}
