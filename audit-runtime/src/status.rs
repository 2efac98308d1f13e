//! Live per-request agent status
//!
//! An optional observer the dispatcher updates as tasks start and finish.
//! Transitions only move forward: pending, running, then one terminal state.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use audit_agents::AgentResult;
use audit_core::{AgentName, FailureKind};

/// Lifecycle of one dispatched agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AgentPhase {
    Pending,
    Running,
    Completed { documents: usize },
    Error { kind: FailureKind },
}

impl AgentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentPhase::Completed { .. } | AgentPhase::Error { .. })
    }

    fn rank(&self) -> u8 {
        match self {
            AgentPhase::Pending => 0,
            AgentPhase::Running => 1,
            AgentPhase::Completed { .. } | AgentPhase::Error { .. } => 2,
        }
    }

    /// Terminal phase for a task outcome
    pub fn from_result(result: &AgentResult) -> Self {
        match result.error() {
            Some(err) => AgentPhase::Error { kind: err.kind() },
            None => AgentPhase::Completed {
                documents: result.document_count(),
            },
        }
    }
}

/// Shared status board; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    phases: Arc<DashMap<AgentName, AgentPhase>>,
}

impl StatusBoard {
    /// Board with every listed agent pending
    pub fn new(agents: &[AgentName]) -> Self {
        let board = Self::default();
        for &agent in agents {
            board.phases.insert(agent, AgentPhase::Pending);
        }
        board
    }

    /// Move an agent forward; backward or repeated terminal transitions are ignored
    pub fn advance(&self, agent: AgentName, phase: AgentPhase) -> bool {
        let mut entry = self.phases.entry(agent).or_insert(AgentPhase::Pending);
        if phase.rank() <= entry.rank() {
            debug!("Ignoring {:?} for {} (already {:?})", phase, agent, *entry);
            return false;
        }
        *entry = phase;
        true
    }

    pub fn mark_running(&self, agent: AgentName) -> bool {
        self.advance(agent, AgentPhase::Running)
    }

    pub fn finish(&self, agent: AgentName, result: &AgentResult) -> bool {
        self.advance(agent, AgentPhase::from_result(result))
    }

    pub fn phase(&self, agent: AgentName) -> Option<AgentPhase> {
        self.phases.get(&agent).map(|p| *p)
    }

    /// Current phases in registry order
    pub fn snapshot(&self) -> Vec<(AgentName, AgentPhase)> {
        let mut phases: Vec<_> = self.phases.iter().map(|e| (*e.key(), *e.value())).collect();
        phases.sort_by_key(|(agent, _)| agent.registry_index());
        phases
    }

    /// Every tracked agent reached a terminal phase
    pub fn is_settled(&self) -> bool {
        self.phases.iter().all(|e| e.value().is_terminal())
    }
}
