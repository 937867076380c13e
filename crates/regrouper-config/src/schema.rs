//! Raw configuration schema (as parsed from YAML or TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from the config document
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Backend host name (`x.y.example.com`) or full base URL
    pub server_name: String,

    /// API key sent as `X-ApiKey`
    pub api_key: String,

    /// Verify the server's TLS certificate (default: true)
    pub verify_ssl: Option<bool>,

    /// Per-request timeout (default: 60)
    pub request_timeout_seconds: Option<u64>,

    /// Rules-based policy group assignment settings
    pub assignment: RawAssignment,
}

/// Assignment loop settings and the ordered category list
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawAssignment {
    /// Sleep between cycles (default: 900)
    pub interval_between_runs_seconds: Option<u64>,

    /// Audit log destination (default: state dir)
    pub output_file: Option<PathBuf>,

    /// Maximum agents per move request (default: 100)
    pub max_batch_size: Option<usize>,

    /// Maximum move requests in flight (default: 1)
    pub max_concurrent_moves: Option<usize>,

    /// Log what would be moved without calling the backend
    #[serde(default)]
    pub simulation_mode: bool,

    /// Only agents currently in one of these groups are eligible for moves
    pub groupids_to_move_from: Option<Vec<String>>,

    /// Seconds to pause per agent moved after each live batch (default: 1,
    /// 0 disables)
    pub throttle_per_agent_moved: Option<f64>,

    /// Backend move request rate limit (default: 1 request per second)
    pub rate_limit: Option<RawRateLimit>,

    /// Ordered classification rules; first match wins
    #[serde(default)]
    pub categories: Vec<RawCategory>,
}

/// Move request rate limit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawRateLimit {
    pub max_requests: u32,
    pub per_seconds: u64,
}

/// Raw category (rule) definition
///
/// At most one predicate key may be set. A category without any predicate
/// key matches every agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawCategory {
    /// Display name, also written to the audit log
    pub name: String,

    pub hostname_startswith: Option<String>,

    pub hostname_contains: Option<String>,

    pub hostname_endswith: Option<String>,

    pub hostname_substring: Option<RawSubstring>,

    pub os_contains: Option<String>,

    /// Groups an agent of this category may already be in
    pub valid_policy_groups: Vec<String>,

    /// Group agents are moved to when they are not in a valid group
    pub target_policy_group: String,
}

impl RawCategory {
    /// Names of the predicate keys set on this category
    pub fn predicate_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.hostname_startswith.is_some() {
            keys.push("hostname_startswith");
        }
        if self.hostname_contains.is_some() {
            keys.push("hostname_contains");
        }
        if self.hostname_endswith.is_some() {
            keys.push("hostname_endswith");
        }
        if self.hostname_substring.is_some() {
            keys.push("hostname_substring");
        }
        if self.os_contains.is_some() {
            keys.push("os_contains");
        }
        keys
    }

    pub fn is_catch_all(&self) -> bool {
        self.predicate_keys().is_empty()
    }
}

/// Hostname slice `[start, end)` compared against `match`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawSubstring {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "match")]
    pub literal: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
config_version: 1
server_name: x.y.managedwhitelisting.com
api_key: z
assignment:
  interval_between_runs_seconds: 60
  categories:
    - name: Lab Machines
      hostname_startswith: lab-
      valid_policy_groups:
        - aaaaaaa1
        - bbbbbbb2
      target_policy_group: aaaaaaa1
    - name: Developers
      hostname_substring:
        start: 3
        end: 6
        match: dev
      valid_policy_groups: [ccccccc3]
      target_policy_group: ccccccc3
    - name: General User Population
      valid_policy_groups: [jjjjjjj0]
      target_policy_group: jjjjjjj0
"#;

    #[test]
    fn parse_yaml_categories() {
        let config: RawConfig = serde_yaml::from_str(YAML).unwrap();
        let categories = &config.assignment.categories;
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0].hostname_startswith.as_deref(), Some("lab-"));

        let substring = categories[1].hostname_substring.as_ref().unwrap();
        assert_eq!((substring.start, substring.end), (3, 6));
        assert_eq!(substring.literal, "dev");

        assert!(categories[2].is_catch_all());
        assert!(!categories[0].is_catch_all());
    }

    #[test]
    fn parse_toml_categories() {
        let toml_str = r#"
            config_version = 1
            server_name = "example.test"
            api_key = "k"

            [assignment]
            simulation_mode = true

            [[assignment.categories]]
            name = "Servers"
            os_contains = "windows server"
            valid_policy_groups = ["d", "e"]
            target_policy_group = "d"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert!(config.assignment.simulation_mode);
        assert_eq!(config.assignment.categories[0].predicate_keys(), vec!["os_contains"]);
    }

    #[test]
    fn unknown_predicate_key_is_rejected() {
        let yaml = r#"
config_version: 1
server_name: s
api_key: k
assignment:
  categories:
    - name: Typo
      hostname_startwith: lab-
      valid_policy_groups: [a]
      target_policy_group: a
"#;
        assert!(serde_yaml::from_str::<RawConfig>(yaml).is_err());
    }
}
