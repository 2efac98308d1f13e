//! Canonical citations and the fused citation set

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::AgentName;

/// A normalized, scored reference to a source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within its source agent
    pub document_id: String,
    pub title: String,
    /// Agent that produced this copy
    pub agent: AgentName,
    pub file_name: String,
    /// Lower-cased with leading dot, e.g. `.pdf`
    pub file_extension: String,
    /// Relevance in [0.0, 1.0]
    pub relevance_score: f64,
    /// Plain-text excerpt of the source content
    pub content: String,
    /// Required keys plus agent-specific extras
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Deduplication key: (document_id, file_name)
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.document_id, &self.file_name)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// One agent's sighting of a fused document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub agent: AgentName,
    pub score: f64,
}

/// A deduplicated citation with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCitation {
    /// Highest-scoring copy of the document
    pub document: Document,
    /// Every agent that reported it, best sighting first
    pub reported_by: Vec<Sighting>,
    pub high_relevance: bool,
}

impl FusedCitation {
    /// Seen by more than one distinct agent
    pub fn is_corroborated(&self) -> bool {
        self.reported_by
            .iter()
            .any(|s| s.agent != self.document.agent)
    }

    /// Best score per distinct reporting agent, first sighting order
    pub fn agent_scores(&self) -> Vec<Sighting> {
        let mut best: Vec<Sighting> = Vec::new();
        for sighting in &self.reported_by {
            match best.iter_mut().find(|b| b.agent == sighting.agent) {
                Some(b) => b.score = b.score.max(sighting.score),
                None => best.push(*sighting),
            }
        }
        best
    }

    /// Difference between the best scores of the most and least confident
    /// agents; zero unless at least two distinct agents reported it
    pub fn score_spread(&self) -> f64 {
        let scores = self.agent_scores();
        if scores.len() < 2 {
            return 0.0;
        }
        let (lo, hi) = scores
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), s| (lo.min(s.score), hi.max(s.score)));
        hi - lo
    }
}

/// Deduplicated citations sorted by descending relevance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedCitationSet {
    citations: Vec<FusedCitation>,
    high_relevance_threshold: f64,
}

impl FusedCitationSet {
    /// Wrap citations that are already deduplicated and ranked
    pub fn from_ranked(citations: Vec<FusedCitation>, high_relevance_threshold: f64) -> Self {
        Self {
            citations,
            high_relevance_threshold,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedCitation> {
        self.citations.iter()
    }

    pub fn citations(&self) -> &[FusedCitation] {
        &self.citations
    }

    /// Ranked documents without provenance
    pub fn documents(&self) -> Vec<Document> {
        self.citations.iter().map(|c| c.document.clone()).collect()
    }

    pub fn high_relevance(&self) -> impl Iterator<Item = &FusedCitation> {
        self.citations.iter().filter(|c| c.high_relevance)
    }

    pub fn high_relevance_threshold(&self) -> f64 {
        self.high_relevance_threshold
    }

    /// Count of citations per file extension
    pub fn document_types(&self) -> BTreeMap<String, usize> {
        let mut types = BTreeMap::new();
        for citation in &self.citations {
            *types
                .entry(citation.document.file_extension.clone())
                .or_insert(0) += 1;
        }
        types
    }

    /// Count of fused citations credited to each agent
    pub fn per_agent_counts(&self) -> BTreeMap<AgentName, usize> {
        let mut counts = BTreeMap::new();
        for citation in &self.citations {
            *counts.entry(citation.document.agent).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(agent: AgentName, score: f64) -> Document {
        Document {
            document_id: "DOC_001".to_string(),
            title: "Sterile fill audit".to_string(),
            agent,
            file_name: "fill.pdf".to_string(),
            file_extension: ".pdf".to_string(),
            relevance_score: score,
            content: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_corroboration_and_spread() {
        let citation = FusedCitation {
            document: doc(AgentName::Sop, 0.9),
            reported_by: vec![
                Sighting { agent: AgentName::Sop, score: 0.9 },
                Sighting { agent: AgentName::InternalAudit, score: 0.4 },
            ],
            high_relevance: true,
        };
        assert!(citation.is_corroborated());
        assert!((citation.score_spread() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_sighting_not_corroborated() {
        let citation = FusedCitation {
            document: doc(AgentName::Sop, 0.5),
            reported_by: vec![Sighting { agent: AgentName::Sop, score: 0.5 }],
            high_relevance: false,
        };
        assert!(!citation.is_corroborated());
        assert_eq!(citation.score_spread(), 0.0);
    }

    #[test]
    fn test_repeat_sightings_from_one_agent_have_no_spread() {
        let citation = FusedCitation {
            document: doc(AgentName::Sop, 0.9),
            reported_by: vec![
                Sighting { agent: AgentName::Sop, score: 0.9 },
                Sighting { agent: AgentName::Sop, score: 0.4 },
            ],
            high_relevance: true,
        };
        assert_eq!(citation.agent_scores().len(), 1);
        assert_eq!(citation.score_spread(), 0.0);
    }

    #[test]
    fn test_spread_uses_each_agents_best_score() {
        let citation = FusedCitation {
            document: doc(AgentName::Sop, 0.9),
            reported_by: vec![
                Sighting { agent: AgentName::Sop, score: 0.9 },
                Sighting { agent: AgentName::InternalAudit, score: 0.7 },
                Sighting { agent: AgentName::Sop, score: 0.1 },
            ],
            high_relevance: true,
        };
        assert_eq!(
            citation.agent_scores(),
            vec![
                Sighting { agent: AgentName::Sop, score: 0.9 },
                Sighting { agent: AgentName::InternalAudit, score: 0.7 },
            ]
        );
        assert!((citation.score_spread() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_document_types() {
        let mut other = doc(AgentName::Sop, 0.3);
        other.file_extension = ".docx".to_string();
        let set = FusedCitationSet::from_ranked(
            vec![
                FusedCitation {
                    document: doc(AgentName::Sop, 0.5),
                    reported_by: vec![],
                    high_relevance: false,
                },
                FusedCitation {
                    document: other,
                    reported_by: vec![],
                    high_relevance: false,
                },
            ],
            0.8,
        );
        let types = set.document_types();
        assert_eq!(types.get(".pdf"), Some(&1));
        assert_eq!(types.get(".docx"), Some(&1));
        assert_eq!(set.per_agent_counts().get(&AgentName::Sop), Some(&2));
    }
}
