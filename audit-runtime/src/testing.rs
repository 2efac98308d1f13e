//! Scripted agents for runtime tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audit_agents::{AgentCapability, AgentError, AgentResponse, RawDocument};
use audit_core::{AgentName, QueryFilters};

/// Returns a fixed document list
pub struct StaticAgent {
    name: AgentName,
    documents: Vec<RawDocument>,
}

impl StaticAgent {
    pub fn new(name: AgentName, docs: &[(&str, f64)]) -> Self {
        let documents = docs
            .iter()
            .map(|(id, score)| {
                RawDocument::new(id, &format!("Document {}", id))
                    .with_score(*score)
                    .with_path(&format!("kb/{}.pdf", id))
            })
            .collect();
        Self { name, documents }
    }

    pub fn from_records(name: AgentName, documents: Vec<RawDocument>) -> Self {
        Self { name, documents }
    }
}

#[async_trait]
impl AgentCapability for StaticAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    async fn query(&self, _text: &str, _filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        Ok(AgentResponse::new(self.documents.clone()))
    }
}

/// Sleeps before answering with nothing
pub struct SlowAgent {
    name: AgentName,
    delay: Duration,
    finished: Option<Arc<AtomicBool>>,
}

impl SlowAgent {
    pub fn new(name: AgentName, delay: Duration) -> Self {
        Self {
            name,
            delay,
            finished: None,
        }
    }

    /// Set a flag if the call ever runs to completion
    pub fn flag_on_finish(mut self, flag: Arc<AtomicBool>) -> Self {
        self.finished = Some(flag);
        self
    }
}

#[async_trait]
impl AgentCapability for SlowAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    async fn query(&self, _text: &str, _filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        tokio::time::sleep(self.delay).await;
        if let Some(flag) = &self.finished {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(AgentResponse::new(vec![]))
    }
}

/// Always fails with the given error
pub struct FailingAgent {
    name: AgentName,
    error: AgentError,
}

impl FailingAgent {
    pub fn new(name: AgentName, error: AgentError) -> Self {
        Self { name, error }
    }
}

#[async_trait]
impl AgentCapability for FailingAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    async fn query(&self, _text: &str, _filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        Err(self.error.clone())
    }
}

/// Panics inside the call
pub struct PanickingAgent {
    name: AgentName,
}

impl PanickingAgent {
    pub fn new(name: AgentName) -> Self {
        Self { name }
    }
}

#[async_trait]
impl AgentCapability for PanickingAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    async fn query(&self, _text: &str, _filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        panic!("index out of range in {}", self.name);
    }
}
