//! Audit record types

use chrono::{DateTime, Utc};
use regrouper_util::{AgentId, GroupId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a move was sent to the backend or only simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveMode {
    Live,
    Simulated,
}

impl MoveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "LIVE",
            Self::Simulated => "SIMULATED",
        }
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIVE" => Ok(Self::Live),
            "SIMULATED" => Ok(Self::Simulated),
            other => Err(format!("unknown move mode '{}'", other)),
        }
    }
}

/// One applied (or simulated) policy-group move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    /// Name of the category the agent was classified into
    pub category: String,
    pub agent_id: AgentId,
    pub from_group: GroupId,
    pub to_group: GroupId,
    pub mode: MoveMode,
}

impl MoveRecord {
    pub fn new(
        hostname: impl Into<String>,
        category: impl Into<String>,
        agent_id: AgentId,
        from_group: GroupId,
        to_group: GroupId,
        mode: MoveMode,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            hostname: hostname.into(),
            category: category.into(),
            agent_id,
            from_group,
            to_group,
            mode,
        }
    }
}
