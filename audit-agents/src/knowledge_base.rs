//! Knowledge-base agent
//!
//! Serves records loaded from a JSON file, ranked by query-term overlap.
//! Stands in for the vector-similarity store in local deployments and demos.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use audit_core::{AgentName, QueryFilters};

use crate::{AgentCapability, AgentError, AgentResponse, RawDocument, ScoreScale};

/// Words too common to carry relevance
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "what", "are", "was", "were", "have",
    "has", "about", "into", "our", "any", "all", "show", "give", "tell", "please", "generate",
];

/// Errors loading a knowledge base file
#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Accepted file layouts: a bare array or `{"documents": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Bare(Vec<RawDocument>),
    Wrapped { documents: Vec<RawDocument> },
}

/// Agent backed by an in-process record collection
#[derive(Debug)]
pub struct KnowledgeBaseAgent {
    name: AgentName,
    scale: ScoreScale,
    records: Vec<RawDocument>,
}

impl KnowledgeBaseAgent {
    pub fn new(name: AgentName, records: Vec<RawDocument>) -> Self {
        Self {
            name,
            scale: ScoreScale::Unit,
            records,
        }
    }

    /// Report scores on a different scale
    pub fn with_scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    /// Load records from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(name: AgentName, path: P) -> Result<Self, KnowledgeBaseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| KnowledgeBaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let agent = Self::from_json_str(name, &content).map_err(|source| KnowledgeBaseError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded {} records for {} from {}", agent.len(), name, path.display());
        Ok(agent)
    }

    pub fn from_json_str(name: AgentName, json: &str) -> Result<Self, serde_json::Error> {
        let records = match serde_json::from_str::<RecordFile>(json)? {
            RecordFile::Bare(records) => records,
            RecordFile::Wrapped { documents } => documents,
        };
        Ok(Self::new(name, records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matches_filters(record: &RawDocument, filters: &QueryFilters) -> bool {
        filters.metadata.iter().all(|(key, wanted)| {
            record
                .metadata
                .get(key)
                .and_then(|v| v.as_str())
                .is_some_and(|v| v.eq_ignore_ascii_case(wanted))
        })
    }
}

/// Lower-cased significant terms of a text
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Searchable text of a record: title, path, content, markup and metadata
fn record_text(record: &RawDocument) -> String {
    let mut parts: Vec<&str> = [&record.title, &record.file_path, &record.content, &record.html]
        .into_iter()
        .filter_map(|f| f.as_deref())
        .collect();
    parts.extend(record.metadata.values().filter_map(|v| v.as_str()));
    parts.join(" ")
}

/// Fraction of query terms present in the record
fn overlap_score(query_terms: &HashSet<String>, record: &RawDocument) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let record_terms = terms(&record_text(record));
    let hits = query_terms.iter().filter(|t| record_terms.contains(*t)).count();
    hits as f64 / query_terms.len() as f64
}

#[async_trait]
impl AgentCapability for KnowledgeBaseAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    fn score_scale(&self) -> ScoreScale {
        self.scale
    }

    async fn query(&self, text: &str, filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        if text.trim().is_empty() {
            return Err(AgentError::InvalidQuery("empty query".to_string()));
        }

        let query_terms = terms(text);
        let mut scored: Vec<(f64, &RawDocument)> = self
            .records
            .iter()
            .filter(|r| Self::matches_filters(r, filters))
            .map(|r| (overlap_score(&query_terms, r), r))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable: equal scores keep file order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(filters.top_k);

        debug!(
            "{} matched {} of {} records",
            self.name,
            scored.len(),
            self.records.len()
        );

        let documents = scored
            .into_iter()
            .map(|(score, record)| {
                let mut doc = record.clone();
                doc.score = Some(self.scale.from_unit(score));
                doc
            })
            .collect();

        Ok(AgentResponse::new(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> KnowledgeBaseAgent {
        KnowledgeBaseAgent::new(
            AgentName::InternalAudit,
            vec![
                RawDocument::new("A-1", "Sterile manufacturing audit checklist")
                    .with_path("audits/sterile.docx")
                    .with_metadata("company", "Hovione"),
                RawDocument::new("A-2", "Warehouse audit report").with_metadata("company", "Lonza"),
                RawDocument::new("A-3", "Cafeteria menu"),
            ],
        )
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let response = agent()
            .query("sterile manufacturing audit", &QueryFilters::default())
            .await
            .unwrap();
        let ids: Vec<_> = response.documents.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, vec!["A-1", "A-2"]);
        assert_eq!(response.documents[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn test_metadata_filter_and_top_k() {
        let filters = QueryFilters::default().with_metadata("company", "lonza");
        let response = agent().query("audit", &filters).await.unwrap();
        assert_eq!(response.documents.len(), 1);
        assert_eq!(response.documents[0].id.as_deref(), Some("A-2"));

        let response = agent()
            .query("audit", &QueryFilters::default().with_top_k(1))
            .await
            .unwrap();
        assert_eq!(response.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_invalid() {
        let err = agent().query("   ", &QueryFilters::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_percent_scale() {
        let response = agent()
            .with_scale(ScoreScale::Percent)
            .query("sterile audit", &QueryFilters::default())
            .await
            .unwrap();
        assert_eq!(response.documents[0].score, Some(100.0));
    }

    #[test]
    fn test_load_wrapped_and_bare() {
        let bare = r#"[{"id": "1", "title": "One"}]"#;
        let wrapped = r#"{"documents": [{"id": "1", "title": "One"}, {"id": "2"}]}"#;
        assert_eq!(KnowledgeBaseAgent::from_json_str(AgentName::Sop, bare).unwrap().len(), 1);
        assert_eq!(KnowledgeBaseAgent::from_json_str(AgentName::Sop, wrapped).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = KnowledgeBaseAgent::from_json_file(AgentName::Sop, "/nonexistent/sop.json").unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::Io { .. }));
    }
}
