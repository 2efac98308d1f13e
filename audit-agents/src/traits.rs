//! Common traits for retrieval agents

use async_trait::async_trait;
use audit_core::{AgentName, FailureKind, QueryFilters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors from agent operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::Unavailable(_) => FailureKind::Unavailable,
            AgentError::Timeout(_) => FailureKind::Timeout,
            AgentError::InvalidQuery(_) => FailureKind::InvalidQuery,
            AgentError::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Scale an agent reports relevance on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// 0.0 - 1.0
    #[default]
    Unit,
    /// 0 - 100
    Percent,
}

impl ScoreScale {
    /// Convert a raw score to the unit scale (unclamped)
    pub fn to_unit(&self, raw: f64) -> f64 {
        match self {
            ScoreScale::Unit => raw,
            ScoreScale::Percent => raw / 100.0,
        }
    }

    /// Convert a unit score to this scale
    pub fn from_unit(&self, unit: f64) -> f64 {
        match self {
            ScoreScale::Unit => unit,
            ScoreScale::Percent => unit * 100.0,
        }
    }
}

/// A record as an agent reports it. Every field is optional and several
/// spellings are accepted, since backends evolve independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, alias = "doc_id", alias = "document_id")]
    pub id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "relevance", alias = "relevance_score")]
    pub score: Option<f64>,
    #[serde(default, alias = "path")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
    #[serde(default, alias = "text", alias = "content_excerpt")]
    pub content: Option<String>,
    /// Raw page markup from scraped sources
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RawDocument {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.file_path = Some(path.to_string());
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
        self
    }
}

/// What an agent returns for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub documents: Vec<RawDocument>,
}

impl AgentResponse {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }
}

/// Tagged outcome of one dispatched agent task
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult {
    Success {
        documents: Vec<RawDocument>,
        scale: ScoreScale,
        /// Sum of the documents' unit-scale scores
        relevance_score: f64,
    },
    Failure {
        error: AgentError,
    },
}

impl AgentResult {
    pub fn success(documents: Vec<RawDocument>, scale: ScoreScale) -> Self {
        let relevance_score = documents
            .iter()
            .filter_map(|d| d.score)
            .map(|s| crate::clamp_unit(scale.to_unit(s)))
            .sum();
        AgentResult::Success {
            documents,
            scale,
            relevance_score,
        }
    }

    pub fn failure(error: AgentError) -> Self {
        AgentResult::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentResult::Success { .. })
    }

    pub fn document_count(&self) -> usize {
        match self {
            AgentResult::Success { documents, .. } => documents.len(),
            AgentResult::Failure { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&AgentError> {
        match self {
            AgentResult::Success { .. } => None,
            AgentResult::Failure { error } => Some(error),
        }
    }
}

/// Uniform interface every specialized retrieval backend implements
#[async_trait]
pub trait AgentCapability: Send + Sync {
    /// Registry slot this capability fills
    fn name(&self) -> AgentName;

    /// Scale of the scores this agent reports
    fn score_scale(&self) -> ScoreScale {
        ScoreScale::Unit
    }

    /// Retrieve scored documents for a query
    async fn query(&self, text: &str, filters: &QueryFilters) -> Result<AgentResponse, AgentError>;
}

/// Thread-safe reference to an agent capability
pub type SharedAgent = Arc<dyn AgentCapability>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AgentError::Timeout(10).kind(), FailureKind::Timeout);
        assert_eq!(AgentError::Unavailable("x".into()).kind(), FailureKind::Unavailable);
        assert_eq!(AgentError::InvalidQuery("x".into()).kind(), FailureKind::InvalidQuery);
        assert_eq!(AgentError::Internal("x".into()).kind(), FailureKind::Internal);
    }

    #[test]
    fn test_raw_document_aliases() {
        let json = r#"{"doc_id": "SNC-7", "name": "Label change", "relevance": 72.5, "path": "kb/snc.csv", "text": "Material Code: AB12"}"#;
        let raw: RawDocument = serde_json::from_str(json).unwrap();
        assert_eq!(raw.id.as_deref(), Some("SNC-7"));
        assert_eq!(raw.title.as_deref(), Some("Label change"));
        assert_eq!(raw.score, Some(72.5));
        assert_eq!(raw.file_path.as_deref(), Some("kb/snc.csv"));
        assert_eq!(raw.content.as_deref(), Some("Material Code: AB12"));
    }

    #[test]
    fn test_success_relevance_uses_unit_scale() {
        let docs = vec![
            RawDocument::new("a", "A").with_score(50.0),
            RawDocument::new("b", "B").with_score(150.0),
            RawDocument::new("c", "C"),
        ];
        let result = AgentResult::success(docs, ScoreScale::Percent);
        match result {
            AgentResult::Success { relevance_score, .. } => {
                assert!((relevance_score - 1.5).abs() < 1e-9)
            }
            AgentResult::Failure { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn test_failure_has_no_documents() {
        let result = AgentResult::failure(AgentError::Timeout(5));
        assert!(!result.is_success());
        assert_eq!(result.document_count(), 0);
        assert_eq!(result.error().map(|e| e.kind()), Some(FailureKind::Timeout));
    }
}
