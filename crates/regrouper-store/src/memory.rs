//! In-memory audit log

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{AuditSink, MoveRecord, StoreError, StoreResult};

/// Audit sink that keeps records in memory (for testing)
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<MoveRecord>>,

    /// Configure appends to fail, as a full disk would
    pub fail_writes: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records appended so far, in arrival order
    pub fn records(&self) -> Vec<MoveRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &MoveRecord) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("mock audit write failure")));
        }
        self.records
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
