//! Agent inventory types

use regrouper_util::{AgentId, GroupId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One managed endpoint as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub hostname: String,
    /// Operating-system descriptor, e.g. "Windows Server 2019"
    pub os: String,
    /// Policy group the agent is currently assigned to
    pub group: GroupId,
}

impl Agent {
    pub fn new(
        id: impl Into<AgentId>,
        hostname: impl Into<String>,
        os: impl Into<String>,
        group: impl Into<GroupId>,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            os: os.into(),
            group: group.into(),
        }
    }
}

/// Opaque pagination cursor handed back by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(cursor: impl Into<String>) -> Self {
        Self(cursor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of the agent inventory
#[derive(Debug, Clone, Default)]
pub struct AgentPage {
    pub agents: Vec<Agent>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<PageCursor>,
}

impl AgentPage {
    /// A single, final page
    pub fn last(agents: Vec<Agent>) -> Self {
        Self {
            agents,
            next_cursor: None,
        }
    }
}
