//! Request and response bodies of the management server API

use regrouper_backend_api::Agent;
use regrouper_util::{AgentId, GroupId};
use serde::{Deserialize, Serialize};

/// `agent/find` request body. Empty on the first page.
#[derive(Debug, Default, Serialize)]
pub(crate) struct FindRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<&'a str>,
}

/// Envelope shared by all responses
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub error: Option<String>,
    pub response: Option<T>,
}

impl<T> Envelope<T> {
    /// Server-reported error message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FindResponse {
    #[serde(default)]
    pub agents: Option<Vec<WireAgent>>,
    #[serde(default)]
    pub checkpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAgent {
    pub agentid: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    pub groupid: String,
}

impl From<WireAgent> for Agent {
    fn from(wire: WireAgent) -> Self {
        Agent {
            id: AgentId::new(wire.agentid),
            hostname: wire.hostname.unwrap_or_default(),
            os: wire.os.unwrap_or_default(),
            group: GroupId::new(wire.groupid),
        }
    }
}

/// `agent/move` request body
#[derive(Debug, Serialize)]
pub(crate) struct MoveRequest<'a> {
    pub groupid: &'a str,
    pub agentid: Vec<&'a str>,
}
