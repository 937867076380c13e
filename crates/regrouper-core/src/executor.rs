//! Batched, rate-limited move execution

use regrouper_backend_api::{Backend, BackendError};
use regrouper_config::RateLimitPolicy;
use regrouper_store::{MoveMode, MoveRecord};
use regrouper_util::{AgentId, GroupId, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// One agent scheduled to leave its current group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub agent_id: AgentId,
    pub hostname: String,
    pub from: GroupId,
}

/// Agents of one category, moved with a single backend request
#[derive(Debug, Clone)]
pub struct MoveBatch {
    pub category: String,
    pub target: GroupId,
    pub moves: Vec<PlannedMove>,
}

impl MoveBatch {
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.moves.iter().map(|m| m.agent_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// A batch the backend refused or never acknowledged
#[derive(Debug, Clone, Error)]
#[error("moving {} agent(s) of category '{category}' to {target} failed: {error}", .agents.len())]
pub struct MoveFailure {
    pub category: String,
    pub target: GroupId,
    pub agents: Vec<AgentId>,
    #[source]
    pub error: BackendError,
}

/// Issues move requests against the backend, one rate-limit token per request
pub struct MoveExecutor {
    backend: Arc<dyn Backend>,
    limiter: Mutex<RateLimiter>,
    throttle_per_agent: Duration,
    simulation: bool,
}

impl MoveExecutor {
    pub fn new(backend: Arc<dyn Backend>, rate_limit: &RateLimitPolicy, simulation: bool) -> Self {
        Self {
            backend,
            limiter: Mutex::new(RateLimiter::new(rate_limit.max_requests, rate_limit.per)),
            throttle_per_agent: Duration::ZERO,
            simulation,
        }
    }

    /// Pause this long per agent after each live batch
    pub fn with_throttle(mut self, per_agent: Duration) -> Self {
        self.throttle_per_agent = per_agent;
        self
    }

    /// How long to wait after a batch before the next one may start.
    /// Zero in simulation mode.
    pub fn pause_after(&self, batch: &MoveBatch) -> Duration {
        if self.simulation {
            return Duration::ZERO;
        }
        self.throttle_per_agent.saturating_mul(u32::try_from(batch.len()).unwrap_or(u32::MAX))
    }

    fn mode(&self) -> MoveMode {
        if self.simulation {
            MoveMode::Simulated
        } else {
            MoveMode::Live
        }
    }

    /// Move every agent in the batch to its target group.
    ///
    /// Simulation mode makes no backend request and consumes no token.
    pub async fn execute(&self, batch: &MoveBatch) -> Result<Vec<MoveRecord>, MoveFailure> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        if !self.simulation {
            self.acquire_token().await;

            let agents = batch.agent_ids();
            if let Err(error) = self.backend.move_agents(&agents, &batch.target).await {
                return Err(MoveFailure {
                    category: batch.category.clone(),
                    target: batch.target.clone(),
                    agents,
                    error,
                });
            }
        }

        debug!(
            category = %batch.category,
            target = %batch.target,
            count = batch.len(),
            simulated = self.simulation,
            "Batch executed"
        );

        let mode = self.mode();
        Ok(batch
            .moves
            .iter()
            .map(|m| {
                MoveRecord::new(
                    m.hostname.clone(),
                    batch.category.clone(),
                    m.agent_id.clone(),
                    m.from.clone(),
                    batch.target.clone(),
                    mode,
                )
            })
            .collect())
    }

    async fn acquire_token(&self) {
        loop {
            let wait = {
                let mut limiter = self.limiter.lock().await;
                if limiter.check() {
                    return;
                }
                limiter.time_until_available()
            };
            trace!(wait_ms = wait.as_millis() as u64, "Waiting for move rate limit");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}
