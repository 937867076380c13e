//! Backend boundary for regrouper
//!
//! This crate defines the interface between the cycle controller and the
//! management server that owns the agent inventory. It contains no
//! transport code itself; see `regrouper-backend-http` for the HTTP
//! implementation.

mod agent;
mod mock;
mod traits;

pub use agent::*;
pub use mock::*;
pub use traits::*;
