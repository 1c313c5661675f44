//! Batched CSV persistence.
//!
//! [`BatchPersister`] buffers rows and appends them to a CSV sink once the
//! buffer reaches a size threshold, so a long crawl survives interruption
//! with everything flushed so far intact. The header row is written exactly
//! once, when the sink file does not yet exist; subsequent flushes append
//! data rows only.
//!
//! Flush failures leave the buffer untouched: rows stay pending for a later
//! retry (or the final [`BatchPersister::flush_remaining`]) and are never
//! silently dropped.
//!
//! One persister owns one sink. Pipelines share it behind
//! `Arc<tokio::sync::Mutex<_>>` so append-then-maybe-flush is a single
//! critical section with respect to other workers.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::PersistError;

/// Default number of buffered rows that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Size-triggered append-only CSV writer.
#[derive(Debug)]
pub struct BatchPersister<T> {
    path: PathBuf,
    threshold: usize,
    buffer: Vec<T>,
}

impl<T: Serialize> BatchPersister<T> {
    pub fn new(path: impl Into<PathBuf>, threshold: usize) -> Self {
        Self {
            path: path.into(),
            threshold: threshold.max(1),
            buffer: Vec::new(),
        }
    }

    /// Sink file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows currently awaiting flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer `rows`, flushing if the threshold is reached.
    ///
    /// On flush failure the rows (old and new) remain buffered and the
    /// error is returned for the caller to report.
    pub fn append(&mut self, rows: Vec<T>) -> Result<(), PersistError> {
        self.buffer.extend(rows);
        if self.buffer.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush whatever is buffered, regardless of the threshold. Called at
    /// run end and on interruption so no completed work is lost.
    pub fn flush_remaining(&mut self) -> Result<(), PersistError> {
        self.flush()
    }

    fn flush(&mut self) -> Result<(), PersistError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .inspect_err(|e| {
                warn!(path = %self.path.display(), error = %e, "failed to open sink; rows retained")
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for row in &self.buffer {
            writer.serialize(row)?;
        }
        writer.flush().map_err(PersistError::Io)?;

        info!(
            path = %self.path.display(),
            rows = self.buffer.len(),
            "flushed batch to sink"
        );
        self.buffer.clear();
        Ok(())
    }
}
