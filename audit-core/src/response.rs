//! Communication log, insights and the fused response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{AgentName, FailureKind, FusedCitationSet, Intent, ORCHESTRATOR_MARKER};

/// Terminal state of one dispatched agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Completed,
    Error,
}

/// One agent's slot in the communication log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub agent: AgentName,
    pub status: AgentStatus,
    /// Documents returned before deduplication; zero on failure
    pub documents_found: usize,
    /// Sum of the agent's unit-scale scores; zero on failure
    pub relevance_score: f64,
    pub error_kind: Option<FailureKind>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl LogEntry {
    pub fn completed(agent: AgentName, documents_found: usize, relevance_score: f64, elapsed_ms: u64) -> Self {
        Self {
            agent,
            status: AgentStatus::Completed,
            documents_found,
            relevance_score,
            error_kind: None,
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(agent: AgentName, kind: FailureKind, error: &str, elapsed_ms: u64) -> Self {
        Self {
            agent,
            status: AgentStatus::Error,
            documents_found: 0,
            relevance_score: 0.0,
            error_kind: Some(kind),
            error: Some(error.to_string()),
            elapsed_ms,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }
}

/// Per-request record of every dispatched agent, in registry order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationLog {
    /// Virtual coordinating participant
    pub coordinator: String,
    pub entries: Vec<LogEntry>,
}

impl Default for CommunicationLog {
    fn default() -> Self {
        Self {
            coordinator: ORCHESTRATOR_MARKER.to_string(),
            entries: Vec::new(),
        }
    }
}

impl CommunicationLog {
    /// Build a log from entries, ordering them by registry position
    pub fn from_entries(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|e| e.agent.registry_index());
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, agent: AgentName) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.agent == agent)
    }

    pub fn completed(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.is_completed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| !e.is_completed())
    }

    /// Number of agents that completed
    pub fn agents_used(&self) -> usize {
        self.completed().count()
    }

    /// Documents found by completed agents only
    pub fn documents_found(&self) -> usize {
        self.completed().map(|e| e.documents_found).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Every dispatched agent failed (false for an empty log)
    pub fn all_failed(&self) -> bool {
        !self.entries.is_empty() && self.failure_count() == self.entries.len()
    }

    /// More than half of the dispatched agents failed
    pub fn is_degraded(&self) -> bool {
        self.failure_count() * 2 > self.entries.len()
    }
}

/// Category of a cross-agent insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Distribution of cited documents by file type
    DocumentTypes,
    /// Documents contributed per agent
    AgentCoverage,
    /// Documents independently reported by several agents
    Corroboration,
    /// Documents that agents scored very differently
    Conflicts,
    /// Quality-systems and internal-audit evidence to cross-check
    QualityAuditCorrelation,
    /// SOP and regulatory evidence to cross-check
    RegulatoryComplianceGaps,
    /// No citation cleared the high-relevance threshold
    Confidence,
    /// Agent failures reduced coverage
    Coverage,
}

/// Insight text keyed by kind; only non-empty observations are present
pub type Insights = BTreeMap<InsightKind, String>;

/// Short reference to a high-relevance citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighRelevanceDocument {
    pub document_id: String,
    pub title: String,
    pub file_name: String,
    pub agent: AgentName,
    pub relevance_score: f64,
}

/// Counters consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub agents_dispatched: usize,
    /// Completed log entries
    pub agents_used: usize,
    pub agents_failed: usize,
    /// Sum of documents over completed entries, before deduplication
    pub documents_found: usize,
    /// Citations after deduplication
    pub unique_documents: usize,
    pub document_types: BTreeMap<String, usize>,
    pub high_relevance: Vec<HighRelevanceDocument>,
    pub all_agents_failed: bool,
}

/// The fused, cited answer to one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResponse {
    pub request_id: Uuid,
    pub query: String,
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
    pub answer: String,
    pub communication_log: CommunicationLog,
    pub citations: FusedCitationSet,
    pub insights: Insights,
    pub summary: SummaryStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> CommunicationLog {
        CommunicationLog::from_entries(vec![
            LogEntry::completed(AgentName::Sop, 3, 2.1, 12),
            LogEntry::failed(AgentName::WebScraper, FailureKind::Timeout, "timed out", 50),
            LogEntry::completed(AgentName::InternalAudit, 4, 3.0, 9),
        ])
    }

    #[test]
    fn test_log_orders_by_registry() {
        let log = sample_log();
        let order: Vec<AgentName> = log.entries.iter().map(|e| e.agent).collect();
        assert_eq!(order, vec![AgentName::WebScraper, AgentName::InternalAudit, AgentName::Sop]);
        assert_eq!(log.coordinator, ORCHESTRATOR_MARKER);
    }

    #[test]
    fn test_log_counters_ignore_failures() {
        let log = sample_log();
        assert_eq!(log.agents_used(), 2);
        assert_eq!(log.documents_found(), 7);
        assert_eq!(log.failure_count(), 1);
        assert!(!log.all_failed());
        assert!(!log.is_degraded());
    }

    #[test]
    fn test_failed_entry_has_zero_counts() {
        let entry = LogEntry::failed(AgentName::Sop, FailureKind::Unavailable, "down", 1);
        assert_eq!(entry.documents_found, 0);
        assert_eq!(entry.relevance_score, 0.0);
        assert_eq!(entry.error_kind, Some(FailureKind::Unavailable));
    }

    #[test]
    fn test_empty_log_is_not_all_failed() {
        assert!(!CommunicationLog::default().all_failed());
    }

    #[test]
    fn test_insight_keys_serialize_snake_case() {
        let mut insights = Insights::new();
        insights.insert(InsightKind::QualityAuditCorrelation, "x".to_string());
        let json = serde_json::to_string(&insights).unwrap();
        assert_eq!(json, r#"{"quality_audit_correlation":"x"}"#);
    }
}
