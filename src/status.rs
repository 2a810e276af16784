//! Where per-run status records go.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

use crate::models::RunStatus;
use crate::Result;

#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn record(&self, status: &RunStatus) -> Result<()>;
}

/// Logs the summary line only.
#[derive(Debug, Default)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn record(&self, status: &RunStatus) -> Result<()> {
        log_summary(status);
        Ok(())
    }
}

/// Appends one JSON object per run to a file, then logs the summary line.
#[derive(Debug, Clone)]
pub struct JsonLinesStatusSink {
    path: PathBuf,
}

impl JsonLinesStatusSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatusSink for JsonLinesStatusSink {
    async fn record(&self, status: &RunStatus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_vec(status)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        log_summary(status);
        Ok(())
    }
}

/// Keeps statuses in memory.
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    statuses: Mutex<Vec<RunStatus>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        match self.statuses.lock() {
            Ok(statuses) => statuses.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl StatusSink for MemoryStatusSink {
    async fn record(&self, status: &RunStatus) -> Result<()> {
        match self.statuses.lock() {
            Ok(mut statuses) => statuses.push(status.clone()),
            Err(poisoned) => poisoned.into_inner().push(status.clone()),
        }
        Ok(())
    }
}

fn log_summary(status: &RunStatus) {
    if status.is_success() {
        tracing::info!("{}", status.summary());
    } else {
        tracing::error!("{}", status.summary());
    }
}
