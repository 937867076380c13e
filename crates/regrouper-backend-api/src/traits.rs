//! Backend traits

use async_trait::async_trait;
use regrouper_util::{AgentId, GroupId};
use thiserror::Error;

use crate::{AgentPage, PageCursor};

/// Errors from backend operations
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Credential rejected (401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by backend")]
    RateLimited,

    /// Connection refused/reset, timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// 5xx
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Undecodable or inconsistent response
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether retrying the same request later may succeed without
    /// operator intervention
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Transport(_) | Self::Server { .. }
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Short machine-friendly label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Transport(_) => "transport",
            Self::Server { .. } => "server",
            Self::Rejected { .. } => "rejected",
            Self::Protocol(_) => "protocol",
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Backend trait - implemented by transport-specific clients
///
/// `move_agents` must be safe to repeat: moving an agent into the group it
/// already belongs to is a no-op on the server.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch one page of the agent inventory. `None` requests the first page.
    async fn fetch_agents(&self, cursor: Option<&PageCursor>) -> BackendResult<AgentPage>;

    /// Move the given agents into `group`
    async fn move_agents(&self, agents: &[AgentId], group: &GroupId) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(BackendError::RateLimited.is_retryable());
        assert!(BackendError::Transport("reset".into()).is_retryable());
        assert!(
            BackendError::Server {
                status: 503,
                message: String::new(),
            }
            .is_retryable()
        );

        assert!(!BackendError::Auth("bad key".into()).is_retryable());
        assert!(!BackendError::NotFound("agent".into()).is_retryable());
        assert!(!BackendError::Protocol("bad json".into()).is_retryable());
        assert!(BackendError::Auth("bad key".into()).is_auth());
    }
}
