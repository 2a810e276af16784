//! Per-run JSON artifacts written to the output directory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;

use crate::models::{AggregateReport, CandidateItem};
use crate::Result;

const ARTIFACT_PREFIXES: [&str; 2] = ["fetch_", "candidates_"];

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(prefix: &str, at: DateTime<Utc>) -> String {
        format!("{}{}.json", prefix, at.format("%Y%m%d_%H%M%S_%3f"))
    }

    pub async fn save_report(&self, at: DateTime<Utc>, report: &AggregateReport) -> Result<PathBuf> {
        self.write_json(&Self::file_name("fetch_", at), report).await
    }

    pub async fn save_candidates(&self, at: DateTime<Utc>, items: &[CandidateItem]) -> Result<PathBuf> {
        self.write_json(&Self::file_name("candidates_", at), items).await
    }

    /// Write JSON atomically (write to temp, then rename).
    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        let bytes = serde_json::to_vec_pretty(value)?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Delete run artifacts last modified more than `max_age` before `now`.
    pub async fn remove_older_than(&self, max_age: Duration, now: SystemTime) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_artifact = name.ends_with(".json") && ARTIFACT_PREFIXES.iter().any(|p| name.starts_with(p));
            if !is_artifact {
                continue;
            }

            let modified = entry.metadata().await?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > max_age {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}
