//! Core engine for regrouperd
//!
//! This crate is the heart of regrouperd, containing:
//! - Classification of agents against the ordered rule set (first match wins)
//! - Remediation decisions (keep, or move to the category's target group)
//! - Paginated inventory retrieval
//! - Rate-limited, batched move execution
//! - The cycle controller (Fetching -> Classifying -> Remediating -> Sleeping)

mod classifier;
mod cycle;
mod engine;
mod executor;
mod inventory;
mod remediator;

pub use classifier::*;
pub use cycle::*;
pub use engine::*;
pub use executor::*;
pub use inventory::*;
pub use remediator::*;
