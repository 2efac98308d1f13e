//! Agent registry
//!
//! Built once at process start and handed to the orchestrator; there is no
//! global instance.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use audit_core::AgentName;

use crate::{AgentCapability, SharedAgent};

/// Closed map from agent name to its capability
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentName, SharedAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under the name it reports
    pub fn register<A: AgentCapability + 'static>(&mut self, agent: A) {
        self.register_shared(Arc::new(agent));
    }

    pub fn register_shared(&mut self, agent: SharedAgent) {
        let name = agent.name();
        if self.agents.insert(name, agent).is_some() {
            warn!("Replaced existing capability for {}", name);
        }
    }

    pub fn with<A: AgentCapability + 'static>(mut self, agent: A) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, name: AgentName) -> Option<SharedAgent> {
        self.agents.get(&name).cloned()
    }

    pub fn contains(&self, name: AgentName) -> bool {
        self.agents.contains_key(&name)
    }

    /// Registered names, registry order
    pub fn names(&self) -> Vec<AgentName> {
        self.agents.keys().copied().collect()
    }

    /// Registry slots with no capability behind them
    pub fn missing(&self) -> Vec<AgentName> {
        AgentName::ALL
            .into_iter()
            .filter(|name| !self.contains(*name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}
