//! Orchestrator
//!
//! Handles one query end to end: classify, select, dispatch, normalize,
//! fuse, synthesize, aggregate. Always yields a well-formed response; agent
//! failures surface in the communication log and insights.

use std::path::Path;
use tracing::{debug, error, info, warn};

use audit_agents::{normalize, AgentRegistry};
use audit_core::{select, Document, FusedResponse, Query, Selection};

use crate::{
    aggregate, fuse, synthesize_with, DispatchCoordinator, DispatchSettings, OrchestratorConfig,
    StatusBoard,
};

/// Query orchestrator for the audit agent set
pub struct Orchestrator {
    coordinator: DispatchCoordinator,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: AgentRegistry, config: OrchestratorConfig) -> Self {
        let missing = registry.missing();
        if !missing.is_empty() {
            warn!(
                "No capability registered for: {}",
                missing.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        let settings = DispatchSettings::from_config(&config);
        Self {
            coordinator: DispatchCoordinator::new(registry, settings),
            config,
        }
    }

    /// Build agents from configuration, filling gaps from a knowledge-base directory
    pub fn from_config(config: OrchestratorConfig, kb_dir: Option<&Path>) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let registry = config.build_registry(kb_dir)?;
        info!("Registered {} of 5 agents", registry.len());
        Ok(Self::new(registry, config))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        self.coordinator.registry()
    }

    /// Intent and agent selection for a query, without dispatching
    pub fn plan(&self, query: &Query) -> Selection {
        select(query.text(), query.resolve_intent())
    }

    pub async fn handle(&self, query: &Query) -> FusedResponse {
        self.handle_observed(query, None).await
    }

    /// Handle a query, reporting per-agent progress to a status board
    pub async fn handle_observed(&self, query: &Query, board: Option<&StatusBoard>) -> FusedResponse {
        let selection = self.plan(query);
        info!(
            "Query classified as {}; dispatching {} agents (rules: {})",
            selection.intent,
            selection.agents.len(),
            if selection.fallback {
                "fallback".to_string()
            } else {
                selection.fired_rules.join(", ")
            }
        );
        debug!("Participants: {:?}", selection.participants());

        let dispatch = self
            .coordinator
            .dispatch_observed(query, &selection.agents, board)
            .await;

        let documents: Vec<Document> = dispatch
            .results
            .iter()
            .flat_map(|(&agent, result)| normalize(agent, result))
            .collect();

        let citations = fuse(documents, self.config.high_relevance_threshold);
        let insights = synthesize_with(&citations, &dispatch.log, self.config.conflict_spread);

        if dispatch.log.all_failed() {
            error!("All {} dispatched agents failed", dispatch.log.len());
        } else if dispatch.log.is_degraded() {
            warn!(
                "{} of {} agents failed; response is degraded",
                dispatch.log.failure_count(),
                dispatch.log.len()
            );
        }

        let response = aggregate(query, selection.intent, dispatch.log, citations, insights);
        info!(
            "Request {} complete: {} citations from {} agents",
            response.request_id,
            response.citations.len(),
            response.summary.agents_used
        );
        response
    }
}
