//! Store trait definitions

use crate::{MoveRecord, StoreResult};

/// Append-only sink for move records.
///
/// Implementations serialize concurrent appends; a record is durable once
/// `append` returns `Ok`. Existing records are never rewritten.
pub trait AuditSink: Send + Sync {
    /// Append one move record
    fn append(&self, record: &MoveRecord) -> StoreResult<()>;

    /// Human-readable destination, for logging
    fn describe(&self) -> String;
}
