use crate::emitter::{ConfirmedEvent, EventSink};
use crate::error::SinkError;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Append-only JSON Lines log of confirmed events, one object per line
pub struct JsonlEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the parent directory if needed
    pub async fn initialize(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SinkError::WriteFailed {
                        event_id: "-".to_string(),
                        details: format!("Failed to create {}: {}", parent.display(), e),
                    })?;
            }
        }
        info!("Event log at {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last `limit` events, oldest first. A missing log reads as empty;
    /// lines that fail to parse are skipped.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ConfirmedEvent>, SinkError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SinkError::ReadFailed {
                    details: format!("{}: {}", self.path.display(), e),
                })
            }
        };

        let mut events = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConfirmedEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    "Skipping unreadable line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }
}

#[async_trait]
impl EventSink for JsonlEventLog {
    async fn record(&self, event: &ConfirmedEvent) -> Result<(), SinkError> {
        let write_failed = |details: String| SinkError::WriteFailed {
            event_id: event.event_id.clone(),
            details,
        };

        let mut line = serde_json::to_string(event).map_err(|e| write_failed(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| write_failed(format!("{}: {}", self.path.display(), e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!("Appended event {} to {}", event.event_id, self.path.display());
        Ok(())
    }
}
