//! HTTP backend for regrouper
//!
//! Talks to the management server's REST API:
//! - `POST /v1/agent/find` for the (optionally checkpoint-paged) inventory
//! - `POST /v1/agent/move` for bulk policy-group moves
//!
//! Requests authenticate with the `X-ApiKey` header. Transport failures
//! are retried in place with exponential backoff; HTTP status codes are
//! mapped onto [`BackendError`](regrouper_backend_api::BackendError).

mod client;
mod retry;
mod wire;

pub use client::*;
