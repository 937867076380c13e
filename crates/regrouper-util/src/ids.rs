//! Strongly-typed identifiers for regrouper

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Backend identifier of a managed endpoint (opaque to regrouper)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Backend identifier of a policy group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one fetch/classify/remediate pass, used to
/// correlate log lines
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_equality() {
        let g1 = GroupId::new("aaaaaaa1-aaaa-aaaa-aaaa-aaaaaaaaaaaa");
        let g2 = GroupId::from("aaaaaaa1-aaaa-aaaa-aaaa-aaaaaaaaaaaa");
        let g3 = GroupId::new("bbbbbbb2-bbbb-bbbb-bbbb-bbbbbbbbbbbb");

        assert_eq!(g1, g2);
        assert_ne!(g1, g3);
    }

    #[test]
    fn cycle_id_uniqueness() {
        assert_ne!(CycleId::new(), CycleId::new());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let agent = AgentId::new("agent-1");
        let json = serde_json::to_string(&agent).unwrap();
        assert_eq!(json, "\"agent-1\"");

        let parsed: GroupId = serde_json::from_str("\"group-9\"").unwrap();
        assert_eq!(parsed.as_str(), "group-9");
    }
}
