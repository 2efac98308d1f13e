//! Audit Intelligence Runtime
//!
//! Orchestrates one query across the agent set:
//! - **Config**: TOML policy and agent wiring
//! - **Dispatch**: concurrent fan-out with per-agent deadlines and panic isolation
//! - **Status**: optional live view of each agent's progress
//! - **Fusion**: deduplication and ranking of citations
//! - **Insights**: cross-agent observations
//! - **Aggregate**: the fused response handed to callers

pub mod config;
pub mod status;
pub mod dispatch;
pub mod fusion;
pub mod insights;
pub mod aggregate;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use status::*;
pub use dispatch::*;
pub use fusion::*;
pub use insights::*;
pub use aggregate::*;
pub use orchestrator::*;
