//! The closed registry of specialized retrieval agents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A specialized retrieval agent.
///
/// Declaration order is the registry order: it drives selection output order
/// and breaks score ties during ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    /// Due diligence reports, FDA warning letters, company reviews
    WebScraper,
    /// Audit procedures, checklists, compliance guidelines
    InternalAudit,
    /// Conference data, industry events, engagement information
    ExternalConference,
    /// Supplier notifications of change, quality events
    QualitySystems,
    /// Standard operating procedures, audit protocols
    Sop,
}

impl AgentName {
    /// Every real agent, in registry order
    pub const ALL: [AgentName; 5] = [
        AgentName::WebScraper,
        AgentName::InternalAudit,
        AgentName::ExternalConference,
        AgentName::QualitySystems,
        AgentName::Sop,
    ];

    /// Stable identifier used in logs, configs and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::WebScraper => "web_scraper",
            AgentName::InternalAudit => "internal_audit",
            AgentName::ExternalConference => "external_conference",
            AgentName::QualitySystems => "quality_systems",
            AgentName::Sop => "sop",
        }
    }

    /// Human-readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentName::WebScraper => "Web Scraper",
            AgentName::InternalAudit => "Internal Audit",
            AgentName::ExternalConference => "External Conference",
            AgentName::QualitySystems => "Quality Systems",
            AgentName::Sop => "SOP",
        }
    }

    /// Position in the registry (tie-break rank)
    pub fn registry_index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for identifiers outside a closed vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("unknown intent: {0}")]
    UnknownIntent(String),
}

impl FromStr for AgentName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        AgentName::ALL
            .into_iter()
            .find(|agent| agent.as_str() == wanted)
            .ok_or_else(|| ParseError::UnknownAgent(s.to_string()))
    }
}

/// Why an agent call did not produce documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Backend unreachable or refusing work
    Unavailable,
    /// Deadline elapsed before the agent answered
    Timeout,
    /// The agent rejected the query
    InvalidQuery,
    /// Anything else, including a panic inside the agent
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidQuery => "invalid_query",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let indices: Vec<usize> = AgentName::ALL.iter().map(|a| a.registry_index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(AgentName::WebScraper < AgentName::Sop);
    }

    #[test]
    fn test_parse_agent_name() {
        assert_eq!("quality_systems".parse::<AgentName>(), Ok(AgentName::QualitySystems));
        assert_eq!("Internal-Audit".parse::<AgentName>(), Ok(AgentName::InternalAudit));
        assert!("orchestrator".parse::<AgentName>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&AgentName::ExternalConference).unwrap();
        assert_eq!(json, "\"external_conference\"");
    }
}
