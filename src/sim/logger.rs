//! Batched, append-only record of per-tick allocations.

use chrono::{DateTime, Utc};

use super::types::AllocationResult;

/// Default number of entries buffered before a flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// One logged tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub result: AllocationResult,
}

/// Accumulates tick results and moves them to the permanent store in batches.
///
/// Entries keep arrival order across flushes.
#[derive(Debug, Clone)]
pub struct ChargingLogger {
    batch_size: usize,
    buffer: Vec<LogEntry>,
    records: Vec<LogEntry>,
}

impl ChargingLogger {
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn new(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            records: Vec::new(),
        }
    }

    /// Appends one tick, flushing when the buffer reaches the batch size.
    pub fn log(&mut self, timestamp: DateTime<Utc>, result: AllocationResult) {
        self.buffer.push(LogEntry { timestamp, result });
        if self.buffer.len() >= self.batch_size {
            self.flush();
        }
    }

    /// Moves all buffered entries into the permanent store.
    pub fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.records.append(&mut self.buffer);
        }
    }

    /// Flushes and returns everything logged so far, oldest first.
    pub fn get_logs(&mut self) -> &[LogEntry] {
        self.flush();
        &self.records
    }

    /// Flushes and hands over the log.
    pub fn into_logs(mut self) -> Vec<LogEntry> {
        self.flush();
        self.records
    }

    /// Number of entries waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of entries already in the permanent store.
    pub fn stored(&self) -> usize {
        self.records.len()
    }
}

impl Default for ChargingLogger {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
