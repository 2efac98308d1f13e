//! Keyword intent classifier
//!
//! Rules are evaluated in table order and the first match wins: a query that
//! mentions both checklist and report terms is a checklist request.

use crate::Intent;

/// One row of the intent rule table
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
}

/// Ordered intent rules; anything unmatched is `Intent::General`
pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Checklist,
        keywords: &["checklist", "list", "steps", "procedures"],
    },
    IntentRule {
        intent: Intent::Report,
        keywords: &["report", "analysis", "summary", "overview"],
    },
    IntentRule {
        intent: Intent::Insights,
        keywords: &["insights", "trends", "patterns", "analysis"],
    },
];

/// Case-insensitive substring membership test
pub(crate) fn mentions_any(haystack_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack_lower.contains(kw))
}

/// Classify query text into an intent. Total: never fails.
pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|rule| mentions_any(&lower, rule.keywords))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::General)
}
