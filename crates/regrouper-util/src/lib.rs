//! Shared utilities for regrouper
//!
//! This crate provides:
//! - ID types (AgentId, GroupId, CycleId)
//! - Rate limiting for backend requests
//! - Default paths for the configuration file and the audit log

mod ids;
mod paths;
mod rate_limit;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
