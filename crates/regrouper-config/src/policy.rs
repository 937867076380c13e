//! Validated policy structures

use crate::schema::{RawAssignment, RawCategory, RawConfig, RawRateLimit};
use crate::validation::ValidationWarning;
use regrouper_util::{GroupId, default_audit_log_path};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Validated policy ready for use by the cycle controller
#[derive(Debug, Clone)]
pub struct Policy {
    /// Backend connection settings
    pub server: ServerConfig,

    /// Loop, batching and audit settings
    pub assignment: AssignmentConfig,

    /// Ordered classification rules
    pub rules: RuleSet,

    /// Non-fatal findings from validation
    pub warnings: Vec<ValidationWarning>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig, warnings: Vec<ValidationWarning>) -> Self {
        let server = ServerConfig {
            server_name: raw.server_name,
            api_key: raw.api_key,
            verify_ssl: raw.verify_ssl.unwrap_or(true),
            request_timeout: Duration::from_secs(
                raw.request_timeout_seconds
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let RawAssignment {
            interval_between_runs_seconds,
            output_file,
            max_batch_size,
            max_concurrent_moves,
            simulation_mode,
            groupids_to_move_from,
            throttle_per_agent_moved,
            rate_limit,
            categories,
        } = raw.assignment;

        let assignment = AssignmentConfig {
            interval: Duration::from_secs(
                interval_between_runs_seconds.unwrap_or(DEFAULT_INTERVAL_SECS),
            ),
            output_file: output_file.unwrap_or_else(default_audit_log_path),
            max_batch_size: max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            max_concurrent_moves: max_concurrent_moves.unwrap_or(1),
            simulation_mode,
            source_groups: groupids_to_move_from
                .map(|groups| groups.into_iter().map(GroupId::new).collect()),
            throttle_per_agent: throttle_per_agent_moved
                .map(Duration::from_secs_f64)
                .unwrap_or(Duration::from_secs(DEFAULT_THROTTLE_PER_AGENT_SECS)),
            rate_limit: rate_limit.map(convert_rate_limit).unwrap_or_default(),
        };

        let rules = RuleSet::new(categories.into_iter().map(convert_category).collect());

        Self {
            server,
            assignment,
            rules,
            warnings,
        }
    }
}

pub const DEFAULT_INTERVAL_SECS: u64 = 900;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_THROTTLE_PER_AGENT_SECS: u64 = 1;

/// Backend connection settings
#[derive(Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub api_key: String,
    pub verify_ssl: bool,
    pub request_timeout: Duration,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server_name", &self.server_name)
            .field("api_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Assignment loop settings
#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    /// Sleep between cycles
    pub interval: Duration,
    /// Audit log destination
    pub output_file: PathBuf,
    pub max_batch_size: usize,
    pub max_concurrent_moves: usize,
    /// Record moves without calling the backend
    pub simulation_mode: bool,
    /// If set, only agents currently in one of these groups are considered
    pub source_groups: Option<BTreeSet<GroupId>>,
    /// Pause after each live batch, multiplied by the batch size
    pub throttle_per_agent: Duration,
    pub rate_limit: RateLimitPolicy,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            output_file: default_audit_log_path(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrent_moves: 1,
            simulation_mode: false,
            source_groups: None,
            throttle_per_agent: Duration::from_secs(DEFAULT_THROTTLE_PER_AGENT_SECS),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

/// Backend move request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub per: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 1,
            per: Duration::from_secs(1),
        }
    }
}

/// Classification predicate.
///
/// Literals are stored lowercased and agent fields are lowercased when
/// evaluated, so matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    HostnameStartsWith(String),
    HostnameContains(String),
    HostnameEndsWith(String),
    /// Hostname characters `[start, end)` equal `literal`
    HostnameSubstring {
        start: usize,
        end: usize,
        literal: String,
    },
    OsContains(String),
    /// Catch-all
    Always,
}

impl Predicate {
    /// Lowercase all literals
    pub fn normalized(self) -> Self {
        match self {
            Self::HostnameStartsWith(s) => Self::HostnameStartsWith(s.to_lowercase()),
            Self::HostnameContains(s) => Self::HostnameContains(s.to_lowercase()),
            Self::HostnameEndsWith(s) => Self::HostnameEndsWith(s.to_lowercase()),
            Self::HostnameSubstring {
                start,
                end,
                literal,
            } => Self::HostnameSubstring {
                start,
                end,
                literal: literal.to_lowercase(),
            },
            Self::OsContains(s) => Self::OsContains(s.to_lowercase()),
            Self::Always => Self::Always,
        }
    }

    /// Evaluate against an agent's hostname and OS, ignoring case
    pub fn matches(&self, hostname: &str, os: &str) -> bool {
        match self {
            Self::HostnameStartsWith(prefix) => {
                hostname.to_lowercase().starts_with(prefix.as_str())
            }
            Self::HostnameContains(needle) => hostname.to_lowercase().contains(needle.as_str()),
            Self::HostnameEndsWith(suffix) => hostname.to_lowercase().ends_with(suffix.as_str()),
            Self::HostnameSubstring {
                start,
                end,
                literal,
            } => {
                if end <= start || hostname.chars().count() < *end {
                    return false;
                }
                // Slice before lowercasing: some characters lowercase to more than one.
                hostname
                    .chars()
                    .skip(*start)
                    .take(end - start)
                    .flat_map(char::to_lowercase)
                    .eq(literal.chars())
            }
            Self::OsContains(needle) => os.to_lowercase().contains(needle.as_str()),
            Self::Always => true,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostnameStartsWith(s) => write!(f, "hostname starts with '{}'", s),
            Self::HostnameContains(s) => write!(f, "hostname contains '{}'", s),
            Self::HostnameEndsWith(s) => write!(f, "hostname ends with '{}'", s),
            Self::HostnameSubstring {
                start,
                end,
                literal,
            } => {
                write!(f, "hostname[{}..{}] is '{}'", start, end, literal)
            }
            Self::OsContains(s) => write!(f, "os contains '{}'", s),
            Self::Always => write!(f, "always"),
        }
    }
}

/// One classification rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub predicate: Predicate,
    /// Groups that satisfy this category
    pub accepted_groups: BTreeSet<GroupId>,
    /// Where non-compliant agents are moved
    pub target_group: GroupId,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        predicate: Predicate,
        accepted_groups: impl IntoIterator<Item = GroupId>,
        target_group: GroupId,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: predicate.normalized(),
            accepted_groups: accepted_groups.into_iter().collect(),
            target_group,
        }
    }

    pub fn accepts(&self, group: &GroupId) -> bool {
        self.accepted_groups.contains(group)
    }
}

/// Immutable, ordered rule list. Evaluation order is declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the first catch-all rule, if any
    pub fn catch_all_index(&self) -> Option<usize> {
        self.rules.iter().position(|r| r.predicate.is_catch_all())
    }

    pub fn has_catch_all(&self) -> bool {
        self.catch_all_index().is_some()
    }

    /// Rules that come after the first catch-all and can never match
    pub fn unreachable_rules(&self) -> &[Rule] {
        match self.catch_all_index() {
            Some(index) => &self.rules[index + 1..],
            None => &[],
        }
    }
}

// Conversion helpers

fn convert_category(raw: RawCategory) -> Rule {
    let predicate = if let Some(prefix) = raw.hostname_startswith {
        Predicate::HostnameStartsWith(prefix)
    } else if let Some(needle) = raw.hostname_contains {
        Predicate::HostnameContains(needle)
    } else if let Some(suffix) = raw.hostname_endswith {
        Predicate::HostnameEndsWith(suffix)
    } else if let Some(substring) = raw.hostname_substring {
        Predicate::HostnameSubstring {
            start: substring.start,
            end: substring.end,
            literal: substring.literal,
        }
    } else if let Some(needle) = raw.os_contains {
        Predicate::OsContains(needle)
    } else {
        Predicate::Always
    };

    Rule::new(
        raw.name,
        predicate,
        raw.valid_policy_groups.into_iter().map(GroupId::new),
        GroupId::new(raw.target_policy_group),
    )
}

fn convert_rate_limit(raw: RawRateLimit) -> RateLimitPolicy {
    RateLimitPolicy {
        max_requests: raw.max_requests,
        per: Duration::from_secs(raw.per_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_boundaries() {
        let dev = Predicate::HostnameSubstring {
            start: 3,
            end: 6,
            literal: "dev".into(),
        };

        assert!(dev.matches("abcdevxyz", ""));
        assert!(dev.matches("abcdev", ""));
        assert!(!dev.matches("ab", ""));
        assert!(!dev.matches("abcde", ""));
        assert!(!dev.matches("abcxyzdev", ""));
    }

    #[test]
    fn test_substring_counts_characters_not_bytes() {
        let dev = Predicate::HostnameSubstring {
            start: 1,
            end: 4,
            literal: "dev".into(),
        };
        assert!(dev.matches("édev01", ""));
    }

    #[test]
    fn test_substring_slices_before_lowercasing() {
        let dev = Predicate::HostnameSubstring {
            start: 1,
            end: 4,
            literal: "dev".into(),
        };
        // 'İ' lowercases to two chars; the slice must still start at 'D'
        assert!(dev.matches("İDEV01", ""));
        assert!(dev.matches("xDeV", ""));
        assert!(!dev.matches("İİdev", ""));
    }

    #[test]
    fn test_rule_literals_are_lowercased() {
        let rule = Rule::new(
            "Servers",
            Predicate::OsContains("Windows Server".into()),
            [GroupId::new("c")],
            GroupId::new("c"),
        );
        assert_eq!(rule.predicate, Predicate::OsContains("windows server".into()));
        assert!(rule.predicate.matches("srv1", "windows server 2019"));
    }

    #[test]
    fn test_unreachable_rules() {
        let rules = RuleSet::new(vec![
            Rule::new("all", Predicate::Always, [GroupId::new("e")], GroupId::new("e")),
            Rule::new(
                "lab",
                Predicate::HostnameStartsWith("lab-".into()),
                [GroupId::new("a")],
                GroupId::new("a"),
            ),
        ]);

        assert_eq!(rules.catch_all_index(), Some(0));
        assert_eq!(rules.unreachable_rules().len(), 1);
        assert_eq!(rules.unreachable_rules()[0].name, "lab");
    }

    #[test]
    fn test_convert_category_without_predicate_is_catch_all() {
        let raw = RawCategory {
            name: "General".into(),
            hostname_startswith: None,
            hostname_contains: None,
            hostname_endswith: None,
            hostname_substring: None,
            os_contains: None,
            valid_policy_groups: vec!["g".into(), "h".into()],
            target_policy_group: "h".into(),
        };

        let rule = convert_category(raw);
        assert!(rule.predicate.is_catch_all());
        assert!(rule.accepts(&GroupId::new("g")));
        assert_eq!(rule.target_group, GroupId::new("h"));
    }
}
