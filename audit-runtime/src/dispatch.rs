//! Dispatch Coordinator
//!
//! Scatter-gather over the selected agents:
//! - One task per agent, all started before any is awaited
//! - Each task is bounded by its own deadline
//! - A panicking or failing agent only fails its own slot
//! - Fan-in waits for every task; dropping the dispatch aborts them all

use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use audit_agents::{AgentError, AgentRegistry, AgentResult};
use audit_core::{AgentName, CommunicationLog, LogEntry, Query};

use crate::{OrchestratorConfig, StatusBoard};

/// Deadlines and limits applied while dispatching
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub default_timeout: Duration,
    pub per_agent_timeout: BTreeMap<AgentName, Duration>,
    pub max_documents_per_agent: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let per_agent_timeout = config
            .agents
            .keys()
            .map(|&agent| (agent, config.timeout_for(agent)))
            .collect();
        Self {
            default_timeout: Duration::from_millis(config.agent_timeout_ms),
            per_agent_timeout,
            max_documents_per_agent: config.max_documents_per_agent,
        }
    }

    pub fn timeout_for(&self, agent: AgentName) -> Duration {
        self.per_agent_timeout
            .get(&agent)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Exactly one result per dispatched agent
    pub results: BTreeMap<AgentName, AgentResult>,
    pub log: CommunicationLog,
}

/// Fans a query out to agents and collects one result per agent
pub struct DispatchCoordinator {
    registry: AgentRegistry,
    settings: DispatchSettings,
}

impl DispatchCoordinator {
    pub fn new(registry: AgentRegistry, settings: DispatchSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub async fn dispatch(&self, query: &Query, agents: &[AgentName]) -> Dispatch {
        self.dispatch_observed(query, agents, None).await
    }

    /// Dispatch, reporting progress to a status board
    pub async fn dispatch_observed(
        &self,
        query: &Query,
        agents: &[AgentName],
        board: Option<&StatusBoard>,
    ) -> Dispatch {
        let selected: BTreeSet<AgentName> = agents.iter().copied().collect();
        let mut outcomes: BTreeMap<AgentName, (AgentResult, u64)> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for &name in &selected {
            let Some(agent) = self.registry.get(name) else {
                warn!("No capability registered for {}", name);
                let result = AgentResult::failure(AgentError::Unavailable(
                    "no capability registered".to_string(),
                ));
                if let Some(board) = board {
                    board.finish(name, &result);
                }
                outcomes.insert(name, (result, 0));
                continue;
            };

            let deadline = self.settings.timeout_for(name);
            let max_documents = self.settings.max_documents_per_agent;
            let text = query.text().to_string();
            let filters = query.filters().clone();
            let board = board.cloned();

            tasks.spawn(async move {
                if let Some(board) = &board {
                    board.mark_running(name);
                }
                let started = Instant::now();
                let call = AssertUnwindSafe(agent.query(&text, &filters)).catch_unwind();

                let result = match tokio::time::timeout(deadline, call).await {
                    Err(_) => AgentResult::failure(AgentError::Timeout(deadline.as_millis() as u64)),
                    Ok(Err(panic)) => AgentResult::failure(AgentError::Internal(format!(
                        "agent panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                    Ok(Ok(Err(err))) => AgentResult::failure(err),
                    Ok(Ok(Ok(mut response))) => {
                        if response.documents.len() > max_documents {
                            warn!(
                                "{} returned {} documents, keeping {}",
                                name,
                                response.documents.len(),
                                max_documents
                            );
                            response.documents.truncate(max_documents);
                        }
                        AgentResult::success(response.documents, agent.score_scale())
                    }
                };

                if let Some(board) = &board {
                    board.finish(name, &result);
                }
                (name, result, started.elapsed().as_millis() as u64)
            });
        }

        debug!("Dispatched {} agent tasks", tasks.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result, elapsed_ms)) => {
                    match result.error() {
                        Some(err) => warn!("{} failed after {} ms: {}", name, elapsed_ms, err),
                        None => debug!(
                            "{} returned {} documents in {} ms",
                            name,
                            result.document_count(),
                            elapsed_ms
                        ),
                    }
                    outcomes.insert(name, (result, elapsed_ms));
                }
                Err(e) => error!("Agent task did not complete: {}", e),
            }
        }

        // A task lost to a join error still owes its slot a result
        for &name in &selected {
            outcomes.entry(name).or_insert_with(|| {
                let result = AgentResult::failure(AgentError::Internal(
                    "agent task did not complete".to_string(),
                ));
                if let Some(board) = board {
                    board.finish(name, &result);
                }
                (result, 0)
            });
        }

        let entries = outcomes
            .iter()
            .map(|(&name, (result, elapsed_ms))| log_entry(name, result, *elapsed_ms))
            .collect();
        let log = CommunicationLog::from_entries(entries);

        info!(
            "Fan-in complete: {} of {} agents succeeded",
            log.agents_used(),
            log.len()
        );

        Dispatch {
            results: outcomes.into_iter().map(|(name, (result, _))| (name, result)).collect(),
            log,
        }
    }
}

/// Communication log entry for one agent outcome
pub fn log_entry(agent: AgentName, result: &AgentResult, elapsed_ms: u64) -> LogEntry {
    match result {
        AgentResult::Success {
            documents,
            relevance_score,
            ..
        } => LogEntry::completed(agent, documents.len(), *relevance_score, elapsed_ms),
        AgentResult::Failure { error } => {
            LogEntry::failed(agent, error.kind(), &error.to_string(), elapsed_ms)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
