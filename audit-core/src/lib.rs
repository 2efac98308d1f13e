//! Audit Intelligence Core - Domain model and routing rules
//!
//! This crate provides the foundational primitives:
//! - The closed agent registry and typed failure kinds
//! - Queries, intents and the keyword intent classifier
//! - The agent selection rule table
//! - Canonical citations, the fused citation set and the fused response

pub mod agent;
pub mod query;
pub mod intent;
pub mod routing;
pub mod document;
pub mod response;

pub use agent::*;
pub use query::*;
pub use intent::*;
pub use routing::*;
pub use document::*;
pub use response::*;

/// Sentinel for fields an agent did not report
pub const UNKNOWN: &str = "Unknown";

/// Title used when an agent omits one
pub const UNKNOWN_TITLE: &str = "Unknown Document";

/// Virtual participant recorded in every selection and log, never dispatched
pub const ORCHESTRATOR_MARKER: &str = "orchestrator";

/// Scores strictly above this are flagged high relevance
pub const DEFAULT_HIGH_RELEVANCE_THRESHOLD: f64 = 0.8;

/// Default number of documents requested from each agent
pub const DEFAULT_TOP_K: usize = 8;
