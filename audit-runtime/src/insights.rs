//! Cross-agent insight synthesis
//!
//! Derives observations from the fused citations and the communication log.
//! Citation-based insights need at least one citation; coverage insights are
//! emitted whenever agents failed badly enough to matter.

use audit_core::{
    AgentName, CommunicationLog, FusedCitation, FusedCitationSet, InsightKind, Insights,
};

use crate::DEFAULT_CONFLICT_SPREAD;

/// Citations named individually before the rest are summarized
const MAX_LISTED: usize = 5;

pub fn synthesize(citations: &FusedCitationSet, log: &CommunicationLog) -> Insights {
    synthesize_with(citations, log, DEFAULT_CONFLICT_SPREAD)
}

/// Synthesize insights with an explicit conflict threshold
pub fn synthesize_with(
    citations: &FusedCitationSet,
    log: &CommunicationLog,
    conflict_spread: f64,
) -> Insights {
    let mut insights = Insights::new();

    if let Some(coverage) = coverage(log) {
        insights.insert(InsightKind::Coverage, coverage);
    }

    if citations.is_empty() {
        return insights;
    }

    insights.insert(InsightKind::DocumentTypes, document_types(citations));
    insights.insert(InsightKind::AgentCoverage, agent_coverage(log));

    let corroborated: Vec<&FusedCitation> = citations.iter().filter(|c| c.is_corroborated()).collect();
    if !corroborated.is_empty() {
        let listed: Vec<String> = corroborated
            .iter()
            .take(MAX_LISTED)
            .map(|c| {
                let agents: Vec<&str> = c.agent_scores().iter().map(|s| s.agent.as_str()).collect();
                format!("{} ({})", c.document.title, agents.join(", "))
            })
            .collect();
        insights.insert(
            InsightKind::Corroboration,
            format!(
                "{} document(s) reported by more than one agent: {}",
                corroborated.len(),
                listed.join("; ")
            ),
        );
    }

    let conflicting: Vec<&FusedCitation> = citations
        .iter()
        .filter(|c| c.is_corroborated() && c.score_spread() > conflict_spread)
        .collect();
    if !conflicting.is_empty() {
        let listed: Vec<String> = conflicting
            .iter()
            .take(MAX_LISTED)
            .map(|c| {
                let scores: Vec<String> = c
                    .agent_scores()
                    .iter()
                    .map(|s| format!("{} {:.2}", s.agent, s.score))
                    .collect();
                format!("{} ({})", c.document.title, scores.join(" vs "))
            })
            .collect();
        insights.insert(
            InsightKind::Conflicts,
            format!(
                "{} document(s) scored inconsistently across agents: {}",
                conflicting.len(),
                listed.join("; ")
            ),
        );
    }

    let quality = evidence_count(citations, AgentName::QualitySystems);
    let audit = evidence_count(citations, AgentName::InternalAudit);
    if quality > 0 && audit > 0 {
        insights.insert(
            InsightKind::QualityAuditCorrelation,
            format!(
                "Quality Systems contributed {} and Internal Audit {} cited document(s); \
                 cross-check quality events against audit findings",
                quality, audit
            ),
        );
    }

    let sop = evidence_count(citations, AgentName::Sop);
    let regulatory = evidence_count(citations, AgentName::WebScraper);
    if sop > 0 && regulatory > 0 {
        insights.insert(
            InsightKind::RegulatoryComplianceGaps,
            format!(
                "SOP contributed {} and Web Scraper {} cited document(s); \
                 compare procedures against regulatory findings for gaps",
                sop, regulatory
            ),
        );
    }

    if citations.high_relevance().next().is_none() {
        insights.insert(
            InsightKind::Confidence,
            format!(
                "No citation scored above the high-relevance threshold of {:.2}; treat the answer as low confidence",
                citations.high_relevance_threshold()
            ),
        );
    }

    insights
}

/// Citations an agent reported, whether or not its copy won
fn evidence_count(citations: &FusedCitationSet, agent: AgentName) -> usize {
    citations
        .iter()
        .filter(|c| c.reported_by.iter().any(|s| s.agent == agent))
        .count()
}

fn document_types(citations: &FusedCitationSet) -> String {
    let mut types: Vec<(String, usize)> = citations.document_types().into_iter().collect();
    types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let parts: Vec<String> = types
        .iter()
        .map(|(ext, count)| format!("{}: {}", ext, count))
        .collect();
    format!("Cited documents by type: {}", parts.join(", "))
}

fn agent_coverage(log: &CommunicationLog) -> String {
    let parts: Vec<String> = log
        .completed()
        .map(|e| format!("{}: {}", e.agent, e.documents_found))
        .collect();
    format!("Documents found per agent: {}", parts.join(", "))
}

fn coverage(log: &CommunicationLog) -> Option<String> {
    if !log.all_failed() && !log.is_degraded() {
        return None;
    }
    let failures: Vec<String> = log
        .failed()
        .map(|e| match e.error_kind {
            Some(kind) => format!("{}: {}", e.agent, kind),
            None => e.agent.to_string(),
        })
        .collect();

    if log.all_failed() {
        Some(format!(
            "All {} dispatched agents failed ({}); no citations are available",
            log.len(),
            failures.join(", ")
        ))
    } else {
        Some(format!(
            "Degraded coverage: {} of {} dispatched agents failed ({})",
            log.failure_count(),
            log.len(),
            failures.join(", ")
        ))
    }
}
