//! Agent selection rule table
//!
//! Rules are independent and additive. The selected set is deduplicated and
//! reported in registry order; an empty set falls back to every agent.

use serde::Serialize;

use crate::intent::mentions_any;
use crate::{AgentName, Intent, ORCHESTRATOR_MARKER};

/// One keyword trigger in the selection table
#[derive(Debug, Clone, Copy)]
pub struct SelectionRule {
    /// Rule identifier reported in `Selection::fired_rules`
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub agents: &'static [AgentName],
}

/// Keyword triggers, evaluated independently
pub static SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        name: "company",
        keywords: &["hovione", "boehringer", "thermo fisher", "company"],
        agents: &[AgentName::QualitySystems, AgentName::ExternalConference],
    },
    SelectionRule {
        name: "audit",
        keywords: &["audit", "compliance", "checklist"],
        agents: &[AgentName::InternalAudit, AgentName::Sop],
    },
    SelectionRule {
        name: "quality",
        keywords: &["quality", "snc", "deviation"],
        agents: &[AgentName::QualitySystems],
    },
    SelectionRule {
        name: "conference",
        keywords: &["conference", "event", "meeting"],
        agents: &[AgentName::ExternalConference],
    },
    SelectionRule {
        name: "regulatory",
        keywords: &["fda", "warning", "due diligence"],
        agents: &[AgentName::WebScraper],
    },
];

/// Outcome of agent selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Intent the selection was made for
    pub intent: Intent,
    /// Virtual coordinating participant; never dispatched
    pub coordinator: &'static str,
    /// Real agents to consult, registry order, never empty
    pub agents: Vec<AgentName>,
    /// Names of the rules that matched
    pub fired_rules: Vec<&'static str>,
    /// True when no rule matched and every agent was selected
    pub fallback: bool,
}

impl Selection {
    pub fn contains(&self, agent: AgentName) -> bool {
        self.agents.contains(&agent)
    }

    /// Participants as shown to the caller: coordinator first, then agents
    pub fn participants(&self) -> Vec<&'static str> {
        std::iter::once(self.coordinator)
            .chain(self.agents.iter().map(|a| a.as_str()))
            .collect()
    }
}

/// Choose which agents to consult for a query.
///
/// The current table is keyword driven only; the intent travels with the
/// selection for logging and the communication log.
pub fn select(text: &str, intent: Intent) -> Selection {
    let lower = text.to_lowercase();
    let mut picked = [false; AgentName::ALL.len()];
    let mut fired_rules = Vec::new();

    for rule in SELECTION_RULES {
        if mentions_any(&lower, rule.keywords) {
            fired_rules.push(rule.name);
            for agent in rule.agents {
                picked[agent.registry_index()] = true;
            }
        }
    }

    let mut agents: Vec<AgentName> = AgentName::ALL
        .into_iter()
        .filter(|agent| picked[agent.registry_index()])
        .collect();

    let fallback = agents.is_empty();
    if fallback {
        agents = AgentName::ALL.to_vec();
    }

    Selection {
        intent,
        coordinator: ORCHESTRATOR_MARKER,
        agents,
        fired_rules,
        fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;

    fn pick(text: &str) -> Selection {
        select(text, classify(text))
    }

    #[test]
    fn test_hovione_checklist_scenario() {
        let selection = pick("Generate a checklist for Hovione sterile manufacturing audit");
        assert_eq!(selection.intent, Intent::Checklist);
        assert_eq!(
            selection.agents,
            vec![
                AgentName::InternalAudit,
                AgentName::ExternalConference,
                AgentName::QualitySystems,
                AgentName::Sop,
            ]
        );
        assert_eq!(selection.fired_rules, vec!["company", "audit"]);
        assert!(!selection.fallback);
    }

    #[test]
    fn test_no_keywords_falls_back_to_all() {
        let selection = pick("What is the weather like today?");
        assert_eq!(selection.intent, Intent::General);
        assert_eq!(selection.agents, AgentName::ALL.to_vec());
        assert!(selection.fallback);
        assert!(selection.fired_rules.is_empty());
    }

    #[test]
    fn test_rules_are_additive_and_deduplicated() {
        let selection = pick("Quality deviation at the company conference");
        assert_eq!(
            selection.agents,
            vec![AgentName::ExternalConference, AgentName::QualitySystems]
        );
        assert_eq!(selection.fired_rules, vec!["company", "quality", "conference"]);
    }

    #[test]
    fn test_regulatory_rule() {
        let selection = pick("Any FDA warning letters?");
        assert_eq!(selection.agents, vec![AgentName::WebScraper]);
    }

    #[test]
    fn test_each_rule_selects_its_agents() {
        for rule in SELECTION_RULES {
            for kw in rule.keywords {
                let selection = select(kw, Intent::General);
                assert!(selection.fired_rules.contains(&rule.name));
                for agent in rule.agents {
                    assert!(selection.contains(*agent), "{} missing {}", kw, agent);
                }
            }
        }
    }

    #[test]
    fn test_selection_never_empty_and_marks_coordinator() {
        for text in ["", "   ", "zzz", "audit", "SNC", "due diligence on a vendor"] {
            let selection = pick(text);
            assert!(!selection.agents.is_empty());
            assert_eq!(selection.participants()[0], ORCHESTRATOR_MARKER);
            assert_eq!(selection.participants().len(), selection.agents.len() + 1);
        }
    }
}
