//! Persistence layer for regrouper
//!
//! Provides:
//! - Move records (one row per applied or simulated move)
//! - CSV audit log (append-only, header written once)
//! - In-memory audit log for tests and dry runs

mod audit;
mod csv_log;
mod memory;
mod traits;

pub use audit::*;
pub use csv_log::*;
pub use memory::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Malformed audit row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("Audit log lock poisoned")]
    LockPoisoned,
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::Csv(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
