//! Result fusion
//!
//! Merges normalized documents from every agent into one ranked citation set.
//! Copies of a document share `(document_id, file_name)`; the highest-scoring
//! copy is kept and the others are folded into its provenance.

use std::collections::HashMap;

use audit_core::{Document, FusedCitation, FusedCitationSet, Sighting};

/// Deduplicate and rank documents
///
/// Ordering is by descending score, then agent registry position, then
/// input position, so the result is fully determined by its input.
pub fn fuse(documents: Vec<Document>, high_relevance_threshold: f64) -> FusedCitationSet {
    let mut ranked: Vec<(usize, Document)> = documents.into_iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.agent.registry_index().cmp(&b.agent.registry_index()))
            .then_with(|| ia.cmp(ib))
    });

    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    let mut citations: Vec<FusedCitation> = Vec::new();

    for (_, document) in ranked {
        let sighting = Sighting {
            agent: document.agent,
            score: document.relevance_score,
        };
        let key = (document.document_id.clone(), document.file_name.clone());

        match positions.get(&key) {
            Some(&pos) => citations[pos].reported_by.push(sighting),
            None => {
                positions.insert(key, citations.len());
                citations.push(FusedCitation {
                    high_relevance: document.relevance_score > high_relevance_threshold,
                    reported_by: vec![sighting],
                    document,
                });
            }
        }
    }

    FusedCitationSet::from_ranked(citations, high_relevance_threshold)
}
