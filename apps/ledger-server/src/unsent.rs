//! Durable record of responses that were computed but never delivered.
//!
//! When a Transfer stream breaks after a transfer has been decided, the
//! outcome may already be committed. Each such response is appended here as
//! one JSON line before the session gives up, so operators can reconcile it.
//!
//! A response counts as sent once it is queued for the transport. If the
//! client disappears while one response sits in that single-slot queue, the
//! queued response is dropped without a journal line; only the next failed
//! send is recorded. Reconcile that one transfer from the store.
//!
//! ```text
//! {"at":"2024-05-01T10:00:00Z","event":"started"}
//! {"at":"2024-05-01T10:03:12Z","request":"req-42","transfer_id":"t-7","status_code":0}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// One undelivered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsentRecord {
    pub at: DateTime<Utc>,
    /// Logging prefix of the session, empty when none was supplied.
    pub request: String,
    pub transfer_id: String,
    pub status_code: i32,
}

#[derive(Serialize)]
struct Marker<'a> {
    at: DateTime<Utc>,
    event: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("unsent journal {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode unsent record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only journal file shared by every session.
#[derive(Debug)]
pub struct UnsentJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl UnsentJournal {
    /// Opens (creating parents as needed) and writes a `started` marker.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| JournalError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        let journal = UnsentJournal {
            path,
            file: Mutex::new(file),
        };

        let marker = serde_json::to_string(&Marker {
            at: Utc::now(),
            event: "started",
        })?;
        journal.append_line(marker).await?;

        info!(path = %journal.path.display(), "Unsent journal opened");
        Ok(journal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record. Returns once the line is on disk.
    pub async fn record(
        &self,
        request: &str,
        transfer_id: &str,
        status_code: i32,
    ) -> Result<(), JournalError> {
        let record = UnsentRecord {
            at: Utc::now(),
            request: request.to_string(),
            transfer_id: transfer_id.to_string(),
            status_code,
        };
        let line = serde_json::to_string(&record)?;
        self.append_line(line).await
    }

    async fn append_line(&self, mut line: String) -> Result<(), JournalError> {
        line.push('\n');

        let mut file = self.file.lock().await;
        let result = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        result.map_err(|source| JournalError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_records(path: &Path) -> Vec<UnsentRecord> {
        tokio::fs::read_to_string(path)
            .await
            .unwrap()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    #[tokio::test]
    async fn test_open_writes_started_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/unsent.log");

        let journal = UnsentJournal::open(&path).await.unwrap();
        assert_eq!(journal.path(), path.as_path());

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"event\":\"started\""));
    }

    #[tokio::test]
    async fn test_records_are_appended_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unsent.log");

        let journal = UnsentJournal::open(&path).await.unwrap();
        journal.record("req-1", "t-1", 0).await.unwrap();
        drop(journal);

        let journal = UnsentJournal::open(&path).await.unwrap();
        journal.record("", "t-2", 10).await.unwrap();

        let records = read_records(&path).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].request, "req-1");
        assert_eq!(records[0].transfer_id, "t-1");
        assert_eq!(records[0].status_code, 0);
        assert_eq!(records[1].transfer_id, "t-2");
        assert_eq!(records[1].status_code, 10);

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.matches("started").count(), 2);
    }
}
