//! Remediation decisions

use regrouper_backend_api::Agent;
use regrouper_util::GroupId;

use crate::Category;

/// What to do with a classified agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Current group already satisfies the category
    NoOp,
    Move { from: GroupId, to: GroupId },
}

impl Action {
    pub fn is_move(&self) -> bool {
        matches!(self, Self::Move { .. })
    }
}

/// Keep the agent where it is if its group is accepted by the category,
/// otherwise move it to the category's target.
pub fn decide(agent: &Agent, category: &Category<'_>) -> Action {
    if category.accepts(&agent.group) {
        Action::NoOp
    } else {
        Action::Move {
            from: agent.group.clone(),
            to: category.target().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use regrouper_config::{Predicate, Rule, RuleSet};

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
                Predicate::OsContains("windows server".into()),
                [group("C"), group("D")],
                group("C"),
            ),
            Rule::new("Default", Predicate::Always, [group("E")], group("E")),
        ])
    }

    fn action_for(agent: &Agent, rules: &RuleSet) -> Action {
        let category = classify(agent, rules).unwrap();
        decide(agent, &category)
    }

    #[test]
    fn end_to_end_example() {
        let rules = example_rules();

        let keep = Agent::new("1", "lab-03", "linux", "B");
        assert_eq!(action_for(&keep, &rules), Action::NoOp);

        let lab = Agent::new("2", "lab-03", "linux", "Z");
        assert_eq!(
            action_for(&lab, &rules),
            Action::Move {
                from: group("Z"),
                to: group("A")
            }
        );

        let server = Agent::new("3", "srv1", "Windows Server 2019", "Z");
        assert_eq!(
            action_for(&server, &rules),
            Action::Move {
                from: group("Z"),
                to: group("C")
            }
        );

        let workstation = Agent::new("4", "ws1", "macos", "Z");
        assert_eq!(
            action_for(&workstation, &rules),
            Action::Move {
                from: group("Z"),
                to: group("E")
            }
        );
    }

    #[test]
    fn noop_iff_current_group_accepted() {
        let rules = example_rules();
        for current in ["A", "B", "C", "D", "E", "Z"] {
            let agent = Agent::new("1", "lab-07", "linux", current);
            let action = action_for(&agent, &rules);
            let accepted = current == "A" || current == "B";
            assert_eq!(!action.is_move(), accepted, "group {current}");
        }
    }

    #[test]
    fn target_outside_accepted_set_still_moves() {
        // Misconfigured rule: target is not an accepted group. The agent is
        // moved every cycle; config validation warns about this.
        let rules = RuleSet::new(vec![Rule::new(
            "Odd",
            Predicate::Always,
            [group("A")],
            group("T"),
        )]);

        let agent = Agent::new("1", "h", "", "T");
        assert_eq!(
            action_for(&agent, &rules),
            Action::Move {
                from: group("T"),
                to: group("T")
            }
        );
    }
}
