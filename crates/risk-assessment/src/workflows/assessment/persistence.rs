use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::domain::AssessmentSnapshot;

/// Storage abstraction so the service can be exercised without a filesystem.
pub trait AssessmentStorage: Send + Sync {
    fn save(&self, snapshot: &AssessmentSnapshot) -> Result<(), StorageError>;
    fn load(&self) -> Result<Option<AssessmentSnapshot>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Typically caused by large embedded images; the user must remove some.
    #[error("assessment needs {required} bytes but storage holds at most {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Single JSON document on disk, written through a temporary file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
    capacity_bytes: usize,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>, capacity_bytes: usize) -> Self {
        Self {
            path: path.into(),
            capacity_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AssessmentStorage for JsonFileStorage {
    fn save(&self, snapshot: &AssessmentSnapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(snapshot)?;
        if bytes.len() > self.capacity_bytes {
            return Err(StorageError::CapacityExceeded {
                required: bytes.len(),
                capacity: self.capacity_bytes,
            });
        }

        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, &bytes)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<AssessmentSnapshot>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Latest outcome of the background writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Saved { at: DateTime<Utc>, entries: usize },
    CapacityExceeded { required: usize, capacity: usize },
    Failed { reason: String },
}

/// Fire-and-forget handle to the background writer. Enqueueing never blocks
/// and never fails the caller's mutation.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    sender: mpsc::UnboundedSender<AssessmentSnapshot>,
    status: watch::Receiver<SaveStatus>,
}

impl PersistenceHandle {
    /// Starts the writer task; must be called from within a tokio runtime.
    pub fn spawn<S>(storage: Arc<S>) -> Self
    where
        S: AssessmentStorage + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);
        tokio::spawn(run_writer(storage, receiver, status_tx));
        Self { sender, status }
    }

    pub fn enqueue(&self, snapshot: AssessmentSnapshot) {
        if self.sender.send(snapshot).is_err() {
            warn!("persistence writer stopped; snapshot dropped");
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }
}

async fn run_writer<S>(
    storage: Arc<S>,
    mut receiver: mpsc::UnboundedReceiver<AssessmentSnapshot>,
    status: watch::Sender<SaveStatus>,
) where
    S: AssessmentStorage + 'static,
{
    while let Some(mut snapshot) = receiver.recv().await {
        // Only the newest queued snapshot matters.
        while let Ok(newer) = receiver.try_recv() {
            snapshot = newer;
        }

        let entries = snapshot.risks.len();
        let writer = Arc::clone(&storage);
        let result = tokio::task::spawn_blocking(move || writer.save(&snapshot)).await;

        let next = match result {
            Ok(Ok(())) => {
                debug!(entries, "assessment snapshot saved");
                SaveStatus::Saved {
                    at: Utc::now(),
                    entries,
                }
            }
            Ok(Err(StorageError::CapacityExceeded { required, capacity })) => {
                warn!(
                    required,
                    capacity, "assessment snapshot exceeds storage capacity"
                );
                SaveStatus::CapacityExceeded { required, capacity }
            }
            Ok(Err(err)) => {
                error!(%err, "assessment snapshot save failed");
                SaveStatus::Failed {
                    reason: err.to_string(),
                }
            }
            Err(join_error) => {
                error!(%join_error, "assessment snapshot writer panicked");
                SaveStatus::Failed {
                    reason: join_error.to_string(),
                }
            }
        };
        status.send_replace(next);
    }
    info!("persistence writer stopped");
}
