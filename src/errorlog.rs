//! Error log - best-effort sink for failed operations.
//!
//! Records are kept in a bounded in-memory list for the end-of-run summary
//! and pushed onto a bounded channel. A single writer task drains the channel
//! and appends one JSON object per line to the log file, so no two tasks ever
//! write the file at once. A full channel drops the record; a failed write is
//! logged and skipped. Neither affects the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{OpKind, WorkItem};

/// Error log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLogConfig {
    /// Append-only JSONL file; None keeps errors in memory only
    pub path: Option<PathBuf>,
    /// Channel capacity between executors and the writer
    pub capacity: usize,
    /// Max records kept in memory for the summary
    pub retain: usize,
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("error.log")),
            capacity: 1024,
            retain: 1000,
        }
    }
}

/// One failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    pub item: String,
    pub operation: OpKind,
    pub round: u64,
    pub attempt: u32,
    pub cause: String,
}

impl ErrorRecord {
    pub fn new(item: &WorkItem, cause: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            item: item.op.key(),
            operation: item.op.kind(),
            round: item.round,
            attempt: item.attempt,
            cause: cause.into(),
        }
    }
}

/// Shared handle executors record errors into
pub struct ErrorLog {
    tx: Mutex<Option<mpsc::Sender<ErrorRecord>>>,
    retained: Mutex<Vec<ErrorRecord>>,
    retain: usize,
    dropped: AtomicU64,
}

impl ErrorLog {
    /// Memory-only log; nothing is written to disk
    pub fn in_memory(retain: usize) -> Self {
        Self {
            tx: Mutex::new(None),
            retained: Mutex::new(Vec::new()),
            retain,
            dropped: AtomicU64::new(0),
        }
    }

    /// Create the log and spawn its writer task if a path is configured
    pub fn spawn(config: &ErrorLogConfig) -> (Self, Option<JoinHandle<()>>) {
        let mut log = Self::in_memory(config.retain);
        let Some(path) = config.path.clone() else {
            return (log, None);
        };
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        log.tx = Mutex::new(Some(tx));
        let handle = tokio::spawn(write_loop(path, rx));
        (log, Some(handle))
    }

    /// Record a failure. Never blocks.
    pub fn record(&self, record: ErrorRecord) {
        {
            let mut retained = self.retained.lock().unwrap_or_else(PoisonError::into_inner);
            if retained.len() < self.retain {
                retained.push(record.clone());
            }
        }

        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = tx.as_ref()
            && tx.try_send(record).is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records dropped because the writer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy of the retained records
    pub fn retained(&self) -> Vec<ErrorRecord> {
        self.retained.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take the retained records, leaving the list empty
    pub fn drain(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.retained.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Stop accepting file writes; the writer exits once the channel drains
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

async fn write_loop(path: PathBuf, mut rx: mpsc::Receiver<ErrorRecord>) {
    while let Some(record) = rx.recv().await {
        if let Err(e) = append(&path, &record).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write error log");
        }
    }
}

async fn append(path: &Path, record: &ErrorRecord) -> std::io::Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;
    use tempfile::TempDir;

    fn record(key: &str) -> ErrorRecord {
        ErrorRecord::new(&WorkItem::new(Operation::Remove { id: key.to_string() }), "boom")
    }

    #[test]
    fn test_record_fields() {
        let item = WorkItem::create(9).in_round(2).into_retry();
        let rec = ErrorRecord::new(&item, "API error 500: down");
        assert_eq!(rec.item, "9");
        assert_eq!(rec.operation, OpKind::Create);
        assert_eq!(rec.round, 2);
        assert_eq!(rec.attempt, 2);
    }

    #[test]
    fn test_in_memory_retains_up_to_limit() {
        let log = ErrorLog::in_memory(2);
        log.record(record("a"));
        log.record(record("b"));
        log.record(record("c"));

        let kept = log.retained();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].item, "a");
        assert_eq!(log.dropped(), 0);

        assert_eq!(log.drain().len(), 2);
        assert!(log.retained().is_empty());
    }

    #[tokio::test]
    async fn test_writer_creates_and_appends_jsonl() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("error.log");
        assert!(!path.exists());

        let config = ErrorLogConfig {
            path: Some(path.clone()),
            capacity: 16,
            retain: 16,
        };
        let (log, handle) = ErrorLog::spawn(&config);
        log.record(record("SM1"));
        log.record(record("SM2"));
        log.close();
        handle.unwrap().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<ErrorRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item, "SM1");
        assert_eq!(lines[1].item, "SM2");
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be opened for append
        let config = ErrorLogConfig {
            path: Some(temp.path().to_path_buf()),
            capacity: 4,
            retain: 4,
        };
        let (log, handle) = ErrorLog::spawn(&config);
        log.record(record("SM1"));
        log.close();
        handle.unwrap().await.unwrap();
        assert_eq!(log.retained().len(), 1);
    }

    #[tokio::test]
    async fn test_full_channel_drops() {
        let temp = TempDir::new().unwrap();
        let config = ErrorLogConfig {
            path: Some(temp.path().join("error.log")),
            capacity: 1,
            retain: 0,
        };
        let (log, _handle) = ErrorLog::spawn(&config);
        // Writer has not run yet on this single-threaded runtime
        log.record(record("a"));
        log.record(record("b"));
        log.record(record("c"));
        assert_eq!(log.dropped(), 2);
    }
}
