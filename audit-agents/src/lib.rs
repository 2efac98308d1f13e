//! Audit Intelligence Agents
//!
//! Retrieval capabilities consulted by the orchestrator:
//! - **Traits**: the uniform `AgentCapability` contract and its typed errors
//! - **Normalizer**: maps native records into canonical citations
//! - **Knowledge base**: JSON-backed local store with term-overlap scoring
//! - **Remote**: HTTP retrieval service client with retry
//! - **Registry**: explicit, injected map of agent capabilities

pub mod traits;
pub mod normalizer;
pub mod knowledge_base;
pub mod remote;
pub mod registry;

pub use traits::*;
pub use normalizer::*;
pub use knowledge_base::*;
pub use remote::*;
pub use registry::*;
