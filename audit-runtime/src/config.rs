//! Orchestrator configuration
//!
//! Loaded from TOML; every field has a default so an absent file or an empty
//! table yields a working configuration.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use audit_agents::{
    AgentError, AgentRegistry, KnowledgeBaseAgent, KnowledgeBaseError, RemoteAgent, RemoteConfig,
    ScoreScale,
};
use audit_core::{AgentName, DEFAULT_HIGH_RELEVANCE_THRESHOLD, DEFAULT_TOP_K};

/// Default per-agent deadline
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 20_000;

/// Score difference between agents that counts as a conflict
pub const DEFAULT_CONFLICT_SPREAD: f64 = 0.3;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Agent {agent}: missing `{field}` for a {kind} source")]
    MissingField {
        agent: AgentName,
        kind: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),

    #[error("Agent {agent}: {source}")]
    Agent {
        agent: AgentName,
        source: AgentError,
    },
}

/// Where an agent's documents come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON record file served by a knowledge-base agent
    #[default]
    File,
    /// Remote retrieval service
    Http,
}

/// Per-agent settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentSourceConfig {
    /// Overrides the global agent timeout
    pub timeout_ms: Option<u64>,
    pub kind: SourceKind,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub score_scale: ScoreScale,
    pub max_retries: Option<u32>,
}

/// Orchestrator policy and agent wiring
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Deadline applied to each agent call
    pub agent_timeout_ms: u64,
    /// Documents kept per agent, and the top-k a query asks for unless it sets one
    pub max_documents_per_agent: usize,
    /// Scores strictly above this are high relevance
    pub high_relevance_threshold: f64,
    /// Agent score difference reported as a conflict
    pub conflict_spread: f64,
    pub agents: BTreeMap<AgentName, AgentSourceConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: DEFAULT_AGENT_TIMEOUT_MS,
            max_documents_per_agent: DEFAULT_TOP_K,
            high_relevance_threshold: DEFAULT_HIGH_RELEVANCE_THRESHOLD,
            conflict_spread: DEFAULT_CONFLICT_SPREAD,
            agents: BTreeMap::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_timeout_ms == 0 {
            return Err(ConfigError::Invalid("agent_timeout_ms must be positive".into()));
        }
        if self.max_documents_per_agent == 0 {
            return Err(ConfigError::Invalid("max_documents_per_agent must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.high_relevance_threshold) {
            return Err(ConfigError::Invalid(format!(
                "high_relevance_threshold {} outside [0, 1]",
                self.high_relevance_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.conflict_spread) {
            return Err(ConfigError::Invalid(format!(
                "conflict_spread {} outside [0, 1]",
                self.conflict_spread
            )));
        }
        if let Some((agent, _)) = self.agents.iter().find(|(_, a)| a.timeout_ms == Some(0)) {
            return Err(ConfigError::Invalid(format!("{}: timeout_ms must be positive", agent)));
        }
        Ok(())
    }

    pub fn with_agent_timeout_ms(mut self, ms: u64) -> Self {
        self.agent_timeout_ms = ms;
        self
    }

    pub fn with_high_relevance_threshold(mut self, threshold: f64) -> Self {
        self.high_relevance_threshold = threshold;
        self
    }

    /// Deadline for one agent
    pub fn timeout_for(&self, agent: AgentName) -> Duration {
        let ms = self
            .agents
            .get(&agent)
            .and_then(|a| a.timeout_ms)
            .unwrap_or(self.agent_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Build capabilities for configured agents, then fill remaining slots
    /// from `<kb_dir>/<agent>.json` when such a file exists.
    pub fn build_registry(&self, kb_dir: Option<&Path>) -> Result<AgentRegistry, ConfigError> {
        let mut registry = AgentRegistry::new();

        for (&agent, source) in &self.agents {
            match source.kind {
                SourceKind::File => {
                    let path = source.path.as_ref().ok_or(ConfigError::MissingField {
                        agent,
                        kind: "file",
                        field: "path",
                    })?;
                    let kb = KnowledgeBaseAgent::from_json_file(agent, path)?
                        .with_scale(source.score_scale);
                    registry.register(kb);
                }
                SourceKind::Http => {
                    let url = source.url.as_ref().ok_or(ConfigError::MissingField {
                        agent,
                        kind: "http",
                        field: "url",
                    })?;
                    let mut remote = RemoteConfig::new(url);
                    remote.score_scale = source.score_scale;
                    if let Some(retries) = source.max_retries {
                        remote.max_retries = retries;
                    }
                    remote.request_timeout_ms = self.timeout_for(agent).as_millis() as u64;
                    let agent_impl = RemoteAgent::new(agent, remote)
                        .map_err(|source| ConfigError::Agent { agent, source })?;
                    registry.register(agent_impl);
                }
            }
        }

        if let Some(dir) = kb_dir {
            for agent in registry.missing() {
                let path = dir.join(format!("{}.json", agent.as_str()));
                if path.is_file() {
                    registry.register(KnowledgeBaseAgent::from_json_file(agent, &path)?);
                } else {
                    debug!("No knowledge base for {} at {}", agent, path.display());
                }
            }
        }

        Ok(registry)
    }
}
