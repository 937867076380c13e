//! Cycle phases and per-cycle reports

use chrono::{DateTime, Utc};
use regrouper_backend_api::BackendError;
use regrouper_util::{AgentId, CycleId};
use std::fmt;
use tracing::{info, warn};

use crate::MoveFailure;

/// Where the cycle controller currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    /// Not started, or stopped after shutdown
    #[default]
    Idle,
    Fetching,
    Classifying,
    Remediating,
    Sleeping,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Remediating => "remediating",
            Self::Sleeping => "sleeping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every planned batch was attempted
    Completed,
    /// The inventory could not be retrieved; nothing was moved
    FetchFailed,
    /// Remaining batches were skipped (shutdown, or credentials rejected)
    Aborted,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::FetchFailed => "fetch_failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Summary of one fetch/classify/remediate pass
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Agents returned by the backend
    pub fetched: usize,
    /// Agents that passed the source-group filter
    pub eligible: usize,
    /// Eligible agents that matched a rule
    pub classified: usize,
    /// Agents scheduled for a move
    pub planned: usize,
    /// Agents moved (or simulated) successfully
    pub applied: usize,

    pub no_match: Vec<AgentId>,
    pub move_failures: Vec<MoveFailure>,
    /// Moves that succeeded but could not be written to the audit log
    pub audit_failures: usize,
    /// Batches never started because the cycle was aborted
    pub skipped_batches: usize,

    pub fetch_error: Option<BackendError>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub(crate) fn start() -> Self {
        Self {
            cycle_id: CycleId::new(),
            started_at: Utc::now(),
            finished_at: None,
            fetched: 0,
            eligible: 0,
            classified: 0,
            planned: 0,
            applied: 0,
            no_match: Vec::new(),
            move_failures: Vec::new(),
            audit_failures: 0,
            skipped_batches: 0,
            fetch_error: None,
            outcome: CycleOutcome::Completed,
        }
    }

    pub(crate) fn finish(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Agents whose move request failed this cycle
    pub fn failed_moves(&self) -> usize {
        self.move_failures.iter().map(|f| f.agents.len()).sum()
    }

    /// True when nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.outcome == CycleOutcome::Completed
            && self.no_match.is_empty()
            && self.move_failures.is_empty()
            && self.audit_failures == 0
    }

    pub fn log_summary(&self) {
        if self.is_clean() {
            info!(
                cycle_id = %self.cycle_id,
                fetched = self.fetched,
                eligible = self.eligible,
                planned = self.planned,
                applied = self.applied,
                outcome = %self.outcome,
                "Cycle finished"
            );
        } else {
            warn!(
                cycle_id = %self.cycle_id,
                fetched = self.fetched,
                eligible = self.eligible,
                classified = self.classified,
                planned = self.planned,
                applied = self.applied,
                no_match = self.no_match.len(),
                failed_moves = self.failed_moves(),
                audit_failures = self.audit_failures,
                skipped_batches = self.skipped_batches,
                outcome = %self.outcome,
                "Cycle finished with problems"
            );
        }
    }
}
