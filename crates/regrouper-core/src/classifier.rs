//! Agent classification

use regrouper_backend_api::Agent;
use regrouper_config::{Rule, RuleSet};
use regrouper_util::{AgentId, GroupId};
use thiserror::Error;

/// The rule an agent was classified into
#[derive(Debug, Clone, Copy)]
pub struct Category<'a> {
    /// Position of the rule in declaration order
    pub index: usize,
    pub rule: &'a Rule,
}

impl<'a> Category<'a> {
    pub fn name(&self) -> &'a str {
        &self.rule.name
    }

    pub fn target(&self) -> &'a GroupId {
        &self.rule.target_group
    }

    pub fn accepts(&self, group: &GroupId) -> bool {
        self.rule.accepts(group)
    }
}

/// No rule matched and the rule set has no catch-all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no rule matches agent {agent_id} ({hostname})")]
pub struct NoMatchingRule {
    pub agent_id: AgentId,
    pub hostname: String,
}

/// Classify an agent. Rules are tried in declaration order and the first
/// match wins.
pub fn classify<'a>(agent: &Agent, rules: &'a RuleSet) -> Result<Category<'a>, NoMatchingRule> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.predicate.matches(&agent.hostname, &agent.os))
        .map(|(index, rule)| Category { index, rule })
        .ok_or_else(|| NoMatchingRule {
            agent_id: agent.id.clone(),
            hostname: agent.hostname.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrouper_config::Predicate;

    fn group(id: &str) -> GroupId {
        GroupId::new(id)
    }

    fn example_rules() -> RuleSet {
        RuleSet::new(vec![
            Rule::new(
                "Lab",
                Predicate::HostnameStartsWith("lab-".into()),
                [group("A"), group("B")],
                group("A"),
            ),
            Rule::new(
                "Servers",
                Predicate::OsContains("Windows Server".into()),
                [group("C"), group("D")],
                group("C"),
            ),
            Rule::new("Default", Predicate::Always, [group("E")], group("E")),
        ])
    }

    #[test]
    fn first_match_wins() {
        let rules = RuleSet::new(vec![
            Rule::new(
                "Dev",
                Predicate::HostnameContains("dev".into()),
                [group("d")],
                group("d"),
            ),
            Rule::new(
                "Lab",
                Predicate::HostnameStartsWith("lab".into()),
                [group("l")],
                group("l"),
            ),
        ]);

        // Matches both rules
        let agent = Agent::new("a1", "lab-dev-01", "linux", "z");
        let category = classify(&agent, &rules).unwrap();
        assert_eq!(category.name(), "Dev");
        assert_eq!(category.index, 0);

        let agent = Agent::new("a2", "lab-01", "linux", "z");
        assert_eq!(classify(&agent, &rules).unwrap().name(), "Lab");
    }

    #[test]
    fn catch_all_matches_everything() {
        let rules = example_rules();
        for hostname in ["", "x", "LAB", "\u{1F600}", "lab"] {
            for os in ["", "macos", "WINDOWS"] {
                let agent = Agent::new("a", hostname, os, "z");
                assert!(classify(&agent, &rules).is_ok(), "{hostname}/{os}");
            }
        }
    }

    #[test]
    fn no_match_without_catch_all() {
        let rules = RuleSet::new(vec![Rule::new(
            "Lab",
            Predicate::HostnameStartsWith("lab-".into()),
            [group("A")],
            group("A"),
        )]);

        let agent = Agent::new("a9", "kiosk-1", "linux", "z");
        let err = classify(&agent, &rules).unwrap_err();
        assert_eq!(err.agent_id, AgentId::new("a9"));
        assert_eq!(err.hostname, "kiosk-1");
    }

    #[test]
    fn matching_ignores_case() {
        let rules = example_rules();
        let agent = Agent::new("a1", "LAB-03", "linux", "z");
        assert_eq!(classify(&agent, &rules).unwrap().name(), "Lab");

        let agent = Agent::new("a2", "sql01", "WINDOWS SERVER 2022", "z");
        assert_eq!(classify(&agent, &rules).unwrap().name(), "Servers");
    }

    #[test]
    fn substring_rule_boundaries() {
        let rules = RuleSet::new(vec![Rule::new(
            "Dev",
            Predicate::HostnameSubstring {
                start: 3,
                end: 6,
                literal: "dev".into(),
            },
            [group("d")],
            group("d"),
        )]);

        assert!(classify(&Agent::new("a", "abcdevxyz", "", "z"), &rules).is_ok());
        assert!(classify(&Agent::new("a", "abcDEVxyz", "", "z"), &rules).is_ok());
        assert!(classify(&Agent::new("a", "ab", "", "z"), &rules).is_err());
        assert!(classify(&Agent::new("a", "abcde", "", "z"), &rules).is_err());
    }

    #[test]
    fn rules_after_catch_all_are_never_chosen() {
        let rules = RuleSet::new(vec![
            Rule::new("Default", Predicate::Always, [group("E")], group("E")),
            Rule::new(
                "Lab",
                Predicate::HostnameStartsWith("lab-".into()),
                [group("A")],
                group("A"),
            ),
        ]);

        let agent = Agent::new("a1", "lab-03", "linux", "z");
        assert_eq!(classify(&agent, &rules).unwrap().name(), "Default");
    }
}
