//! ==============================================================================
//! store.rs - append-only reading log
//! ==============================================================================
//!
//! purpose:
//!     durable, append-only store of historical sensor records, one text
//!     line per reading. the scheduler appends; the request server's `raw`
//!     handler reads the whole thing back. never truncated here.
//!
//! concurrency:
//!     one writer (scheduler tick) and one reader (`raw` handler) can
//!     overlap in time. the filesystem does not guarantee a reader never
//!     sees a half-written line, so a coarse mutex serializes "append one
//!     line" against "read to end".
//!
//! relationships:
//!     - used by: scheduler.rs (append), server.rs (read_all)
//!     - errors: error.rs (StorageError - logged, never fatal)
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::StorageError;

pub struct ReadingLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl ReadingLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The trailing newline is added here so a record is
    /// always a whole line.
    pub async fn append(&self, line: &str) -> Result<(), StorageError> {
        let _held = self.guard.lock().await;

        let map = |source| StorageError::Append {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(map)?;

        let mut record = line.as_bytes().to_vec();
        record.push(b'\n');
        file.write_all(&record).await.map_err(map)?;
        file.flush().await.map_err(map)?;
        Ok(())
    }

    /// Read the full current contents. A log that does not exist yet reads
    /// as empty; the `raw` command then returns a zero-length body.
    pub async fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        let _held = self.guard.lock().await;

        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_path(tag: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "weather-node-{}-{}-{}.log",
            tag,
            std::process::id(),
            n
        ))
    }

    #[tokio::test]
    async fn missing_log_reads_as_empty() {
        let log = ReadingLog::new(scratch_path("missing"));
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_then_read_round_trip() {
        let path = scratch_path("roundtrip");
        let log = ReadingLog::new(&path);

        log.append("2024-12-18 06:30:15,99875,29.50,20.00,68.00")
            .await
            .unwrap();
        log.append("2024-12-18 06:30:30,99880,29.51,20.01,68.02")
            .await
            .unwrap();

        let body = String::from_utf8(log.read_all().await.unwrap()).unwrap();
        let last = body.lines().last().unwrap();
        assert_eq!(last, "2024-12-18 06:30:30,99880,29.51,20.01,68.02");
        assert_eq!(body.lines().count(), 2);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn reads_are_idempotent_between_appends() {
        let path = scratch_path("idempotent");
        let log = ReadingLog::new(&path);
        log.append("a,1,2.00,3.00,4.00").await.unwrap();

        let first = log.read_all().await.unwrap();
        let second = log.read_all().await.unwrap();
        assert_eq!(first, second);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn concurrent_append_and_read_never_tears_a_line() {
        let path = scratch_path("torn");
        let log = Arc::new(ReadingLog::new(&path));

        let writer = {
            let log = log.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let line =
                        format!("2024-12-18 06:30:{:02},99875,29.50,20.00,68.00", i % 60);
                    log.append(&line).await.unwrap();
                }
            })
        };

        let reader = {
            let log = log.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let body = String::from_utf8(log.read_all().await.unwrap()).unwrap();
                    for line in body.lines() {
                        assert_eq!(
                            line.split(',').count(),
                            5,
                            "torn line observed: {:?}",
                            line
                        );
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        tokio::fs::remove_file(&path).await.ok();
    }
}
