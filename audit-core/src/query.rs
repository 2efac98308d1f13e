//! Queries, intents and retrieval filters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{classify, ParseError, DEFAULT_TOP_K};

/// Classified purpose of a user query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Checklist,
    Report,
    Insights,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Checklist => "checklist",
            Intent::Report => "report",
            Intent::Insights => "insights",
            Intent::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checklist" => Ok(Intent::Checklist),
            "report" => Ok(Intent::Report),
            "insights" => Ok(Intent::Insights),
            "general" => Ok(Intent::General),
            _ => Err(ParseError::UnknownIntent(s.to_string())),
        }
    }
}

/// Narrowing applied by each agent to its own store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Maximum documents the agent should return
    pub top_k: usize,
    /// Exact-match (case-insensitive) metadata constraints, e.g. `company`
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            metadata: BTreeMap::new(),
        }
    }
}

impl QueryFilters {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// A single audit question; created per request and never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    intent_override: Option<Intent>,
    filters: QueryFilters,
}

impl Query {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            intent_override: None,
            filters: QueryFilters::default(),
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent_override = Some(intent);
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn intent_override(&self) -> Option<Intent> {
        self.intent_override
    }

    pub fn filters(&self) -> &QueryFilters {
        &self.filters
    }

    /// The explicit override if present, otherwise the classified intent
    pub fn resolve_intent(&self) -> Intent {
        self.intent_override.unwrap_or_else(|| classify(&self.text))
    }
}
