//! Response aggregation
//!
//! Assembles the fused response: the communication log, ranked citations,
//! insights, summary counters and a deterministic answer text.

use chrono::Utc;
use uuid::Uuid;

use audit_core::{
    CommunicationLog, FusedCitationSet, FusedResponse, HighRelevanceDocument, Insights, Intent,
    Query, SummaryStats,
};

/// Citations named in the answer text
const ANSWER_SOURCES: usize = 3;

pub fn aggregate(
    query: &Query,
    intent: Intent,
    log: CommunicationLog,
    citations: FusedCitationSet,
    insights: Insights,
) -> FusedResponse {
    let summary = summarize(&log, &citations);
    let answer = compose_answer(intent, &log, &citations);

    FusedResponse {
        request_id: Uuid::new_v4(),
        query: query.text().to_string(),
        intent,
        created_at: Utc::now(),
        answer,
        communication_log: log,
        citations,
        insights,
        summary,
    }
}

/// Counters derived from the log and the citation set
pub fn summarize(log: &CommunicationLog, citations: &FusedCitationSet) -> SummaryStats {
    let high_relevance = citations
        .high_relevance()
        .map(|c| HighRelevanceDocument {
            document_id: c.document.document_id.clone(),
            title: c.document.title.clone(),
            file_name: c.document.file_name.clone(),
            agent: c.document.agent,
            relevance_score: c.document.relevance_score,
        })
        .collect();

    SummaryStats {
        agents_dispatched: log.len(),
        agents_used: log.agents_used(),
        agents_failed: log.failure_count(),
        documents_found: log.documents_found(),
        unique_documents: citations.len(),
        document_types: citations.document_types(),
        high_relevance,
        all_agents_failed: log.all_failed(),
    }
}

/// Answer text built from the ranked citations
///
/// Natural-language generation is out of scope; this lists the strongest
/// sources so the response is usable on its own.
pub fn compose_answer(intent: Intent, log: &CommunicationLog, citations: &FusedCitationSet) -> String {
    if log.all_failed() {
        return format!(
            "No answer for this {} request: all {} consulted agents failed.",
            intent,
            log.len()
        );
    }
    if citations.is_empty() {
        return format!(
            "Consulted {} agent(s) for this {} request but found no relevant documents.",
            log.agents_used(),
            intent
        );
    }

    let sources: Vec<String> = citations
        .iter()
        .take(ANSWER_SOURCES)
        .map(|c| {
            format!(
                "[{}] {} ({}, {:.2})",
                c.document.document_id, c.document.title, c.document.agent, c.document.relevance_score
            )
        })
        .collect();

    format!(
        "Found {} relevant document(s) from {} agent(s) for this {} request. Top sources: {}",
        citations.len(),
        log.agents_used(),
        intent,
        sources.join("; ")
    )
}
