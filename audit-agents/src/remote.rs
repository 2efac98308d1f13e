//! Remote retrieval agent
//!
//! Queries a retrieval service over HTTP:
//! `GET <url>?q=<query>&top_k=<n>[&<filter>=<value>...]` answering
//! `{"documents": [...]}`. Transient failures are retried with jittered
//! exponential backoff.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use audit_core::{AgentName, QueryFilters};

use crate::{AgentCapability, AgentError, AgentResponse, ScoreScale};

/// Remote agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Search endpoint
    pub url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retries after the first attempt, for unavailable backends only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub score_scale: ScoreScale,
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    200
}

impl RemoteConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            score_scale: ScoreScale::Unit,
        }
    }
}

/// Agent that delegates retrieval to an HTTP service
#[derive(Debug)]
pub struct RemoteAgent {
    name: AgentName,
    config: RemoteConfig,
    client: Client,
}

impl RemoteAgent {
    pub fn new(name: AgentName, config: RemoteConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| AgentError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { name, config, client })
    }

    /// Full request URL for a query
    pub fn build_url(&self, text: &str, filters: &QueryFilters) -> String {
        let mut url = format!(
            "{}?q={}&top_k={}",
            self.config.url,
            urlencoding::encode(text),
            filters.top_k
        );
        for (key, value) in &filters.metadata {
            url.push('&');
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn fetch(&self, url: &str) -> Result<AgentResponse, AgentError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.config.request_timeout_ms)
            } else {
                AgentError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        response
            .json::<AgentResponse>()
            .await
            .map_err(|e| AgentError::Internal(format!("malformed response: {}", e)))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_ms.saturating_mul(1u64 << attempt.min(10));
        let jitter = rand::thread_rng().gen_range(0..=self.config.backoff_ms / 2);
        Duration::from_millis(base + jitter)
    }
}

/// Map a non-success HTTP status to an agent error
fn classify_status(status: StatusCode) -> Option<AgentError> {
    if status.is_success() {
        None
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Some(AgentError::Unavailable(format!("HTTP {}", status)))
    } else if status.is_client_error() {
        Some(AgentError::InvalidQuery(format!("HTTP {}", status)))
    } else {
        Some(AgentError::Internal(format!("unexpected HTTP {}", status)))
    }
}

#[async_trait]
impl AgentCapability for RemoteAgent {
    fn name(&self) -> AgentName {
        self.name
    }

    fn score_scale(&self) -> ScoreScale {
        self.config.score_scale
    }

    async fn query(&self, text: &str, filters: &QueryFilters) -> Result<AgentResponse, AgentError> {
        let url = self.build_url(text, filters);
        let mut attempt = 0;

        loop {
            debug!("{} querying {} (attempt {})", self.name, self.config.url, attempt + 1);
            match self.fetch(&url).await {
                Err(AgentError::Unavailable(reason)) if attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} unavailable ({}), retrying in {} ms",
                        self.name,
                        reason,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn agent() -> RemoteAgent {
        RemoteAgent::new(AgentName::WebScraper, RemoteConfig::new("http://localhost:9/search")).unwrap()
    }

    #[test]
    fn test_build_url_encodes_query_and_filters() {
        let filters = QueryFilters::default()
            .with_top_k(5)
            .with_metadata("company", "Thermo Fisher");
        let url = agent().build_url("FDA warning & 483", &filters);
        assert_eq!(
            url,
            "http://localhost:9/search?q=FDA%20warning%20%26%20483&top_k=5&company=Thermo%20Fisher"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(AgentError::Unavailable(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(AgentError::Unavailable(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST),
            Some(AgentError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_backoff_grows() {
        let agent = agent();
        let first = agent.backoff(0);
        let third = agent.backoff(2);
        assert!(first >= Duration::from_millis(200) && first <= Duration::from_millis(300));
        assert!(third >= Duration::from_millis(800));
    }

    #[test]
    fn test_config_defaults() {
        let config: RemoteConfig = serde_json::from_str(r#"{"url": "http://x/search"}"#).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.score_scale, ScoreScale::Unit);
    }

    /// Serve scripted `(status, body)` replies, one per connection; the last
    /// reply repeats. Returns the endpoint and a connection counter.
    async fn scripted_server(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = replies[n.min(replies.len() - 1)];
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/search", addr), hits)
    }

    /// Accept connections and never answer
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    drop(socket);
                });
            }
        });
        format!("http://{}/search", addr)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
    }

    fn fast_agent(url: &str) -> RemoteAgent {
        let mut config = RemoteConfig::new(url);
        config.backoff_ms = 1;
        config.request_timeout_ms = 2_000;
        RemoteAgent::new(AgentName::WebScraper, config).unwrap()
    }

    const FOUND: &str = r#"{"documents": [{"id": "W-1", "title": "FDA 483 observations", "score": 0.7}]}"#;

    #[tokio::test]
    async fn test_retries_unavailable_until_success() {
        let (url, hits) = scripted_server(vec![(503, "{}"), (503, "{}"), (200, FOUND)]).await;
        let response = fast_agent(&url)
            .query("fda warning", &QueryFilters::default())
            .await
            .unwrap();
        assert_eq!(response.documents.len(), 1);
        assert_eq!(response.documents[0].id.as_deref(), Some("W-1"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (url, hits) = scripted_server(vec![(503, "{}")]).await;
        let result = fast_agent(&url).query("fda", &QueryFilters::default()).await;
        assert!(matches!(result, Err(AgentError::Unavailable(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (url, hits) = scripted_server(vec![(400, "{}")]).await;
        let result = fast_agent(&url).query("fda", &QueryFilters::default()).await;
        assert!(matches!(result, Err(AgentError::InvalidQuery(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_internal() {
        let (url, hits) = scripted_server(vec![(200, "not json")]).await;
        let result = fast_agent(&url).query("fda", &QueryFilters::default()).await;
        assert!(matches!(result, Err(AgentError::Internal(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let url = silent_server().await;
        let mut config = RemoteConfig::new(&url);
        config.request_timeout_ms = 100;
        let agent = RemoteAgent::new(AgentName::WebScraper, config).unwrap();

        let result = agent.query("fda", &QueryFilters::default()).await;
        assert_eq!(result, Err(AgentError::Timeout(100)));
    }
}
