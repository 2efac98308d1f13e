//! Audit Intelligence CLI
//!
//! Routes audit questions to specialized retrieval agents and prints the
//! fused, cited response.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use audit_core::{select, AgentName, FusedResponse, Intent, Query, QueryFilters};
use audit_runtime::{AgentPhase, Orchestrator, OrchestratorConfig, StatusBoard};

#[derive(Parser)]
#[command(name = "audit-intel")]
#[command(author, version, about = "Multi-agent audit intelligence orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer an audit question from the agent knowledge bases
    Query {
        /// The question
        #[arg(short, long)]
        query: String,

        /// Directory holding `<agent>.json` knowledge bases
        #[arg(long, env = "AUDIT_KB_DIR")]
        kb_dir: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long, env = "AUDIT_CONFIG")]
        config: Option<PathBuf>,

        /// Force an intent instead of classifying the question
        #[arg(long)]
        intent: Option<String>,

        /// Per-agent timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// High-relevance threshold in [0, 1]
        #[arg(long)]
        threshold: Option<f64>,

        /// Documents requested per agent [default: max_documents_per_agent]
        #[arg(long)]
        top_k: Option<usize>,

        /// Metadata filter, repeatable (e.g. --filter company=Hovione)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Also write the JSON response to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how a question would be classified and routed
    Classify {
        /// The question
        #[arg(short, long)]
        query: String,
    },

    /// List agent slots and which have a capability behind them
    Agents {
        #[arg(long, env = "AUDIT_KB_DIR")]
        kb_dir: Option<PathBuf>,

        #[arg(short, long, env = "AUDIT_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Query {
            query,
            kb_dir,
            config,
            intent,
            timeout_ms,
            threshold,
            top_k,
            filters,
            json,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(ms) = timeout_ms {
                config.agent_timeout_ms = ms;
            }
            if let Some(threshold) = threshold {
                config.high_relevance_threshold = threshold;
            }
            let top_k = top_k_for(top_k, &config);
            let orchestrator = Orchestrator::from_config(config, kb_dir.as_deref())?;

            let query = build_query(&query, intent.as_deref(), top_k, &filters)?;
            let Some(response) = run_query(&orchestrator, &query).await else {
                return Ok(());
            };

            if let Some(path) = output {
                fs::write(&path, serde_json::to_string_pretty(&response)?)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Response saved to: {}", path.display());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }

        Commands::Classify { query } => {
            let query = Query::new(&query);
            let selection = select(query.text(), query.resolve_intent());
            println!("Intent:       {}", selection.intent);
            println!(
                "Rules fired:  {}",
                if selection.fallback {
                    "none (fallback to all agents)".to_string()
                } else {
                    selection.fired_rules.join(", ")
                }
            );
            println!("Participants: {}", selection.participants().join(", "));
        }

        Commands::Agents { kb_dir, config } => {
            let config = load_config(config.as_deref())?;
            let registry = config.build_registry(kb_dir.as_deref())?;
            for agent in AgentName::ALL {
                let state = if registry.contains(agent) { "ready" } else { "missing" };
                let timeout = config.timeout_for(agent).as_millis();
                println!(
                    "{:<20} {:<20} {:<8} timeout {} ms",
                    agent.as_str(),
                    agent.display_name(),
                    state,
                    timeout
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => Ok(OrchestratorConfig::load(path)?),
        None => Ok(OrchestratorConfig::default()),
    }
}

/// Requested top-k, or the configured per-agent document limit
fn top_k_for(flag: Option<usize>, config: &OrchestratorConfig) -> usize {
    flag.unwrap_or(config.max_documents_per_agent)
}

fn build_query(text: &str, intent: Option<&str>, top_k: usize, filters: &[String]) -> Result<Query> {
    if text.trim().is_empty() {
        bail!("query must not be empty");
    }

    let mut query_filters = QueryFilters::default().with_top_k(top_k);
    for filter in filters {
        let Some((key, value)) = filter.split_once('=') else {
            bail!("filter `{}` is not KEY=VALUE", filter);
        };
        query_filters = query_filters.with_metadata(key.trim(), value.trim());
    }

    let mut query = Query::new(text).with_filters(query_filters);
    if let Some(intent) = intent {
        query = query.with_intent(intent.parse::<Intent>()?);
    }
    Ok(query)
}

/// Handle a query while reporting agent progress; Ctrl-C cancels outstanding agents
async fn run_query(orchestrator: &Orchestrator, query: &Query) -> Option<FusedResponse> {
    let board = StatusBoard::new(&orchestrator.plan(query).agents);
    let handle = orchestrator.handle_observed(query, Some(&board));
    tokio::pin!(handle);

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_snapshot = Vec::new();

    loop {
        tokio::select! {
            response = &mut handle => return Some(response),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; cancelling outstanding agents");
                return None;
            }
            _ = ticker.tick() => {
                let snapshot = board.snapshot();
                if snapshot != last_snapshot {
                    debug!("Agent status: {}", format_snapshot(&snapshot));
                    last_snapshot = snapshot;
                }
            }
        }
    }
}

fn format_snapshot(snapshot: &[(AgentName, AgentPhase)]) -> String {
    snapshot
        .iter()
        .map(|(agent, phase)| {
            let state = match phase {
                AgentPhase::Pending => "pending".to_string(),
                AgentPhase::Running => "running".to_string(),
                AgentPhase::Completed { documents } => format!("completed ({})", documents),
                AgentPhase::Error { kind } => format!("error ({})", kind),
            };
            format!("{}={}", agent, state)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_response(response: &FusedResponse) {
    println!("\n{}\n", "=".repeat(60));
    println!("{}", response.answer);
    println!("\n{}", "-".repeat(60));

    println!("Intent: {}    Request: {}", response.intent, response.request_id);
    println!(
        "Agents: {} used, {} failed    Documents: {} found, {} unique",
        response.summary.agents_used,
        response.summary.agents_failed,
        response.summary.documents_found,
        response.summary.unique_documents
    );

    println!("\nCommunication log ({}):", response.communication_log.coordinator);
    for entry in &response.communication_log.entries {
        match &entry.error {
            Some(error) => println!("  {:<20} error      {} ({} ms)", entry.agent, error, entry.elapsed_ms),
            None => println!(
                "  {:<20} completed  {} documents, relevance {:.2} ({} ms)",
                entry.agent, entry.documents_found, entry.relevance_score, entry.elapsed_ms
            ),
        }
    }

    if !response.citations.is_empty() {
        println!("\nCitations:");
        for (i, citation) in response.citations.iter().enumerate() {
            let doc = &citation.document;
            println!(
                "  {:>2}. [{:.2}]{} {} ({}, {})",
                i + 1,
                doc.relevance_score,
                if citation.high_relevance { " *" } else { "" },
                doc.title,
                doc.file_name,
                doc.agent
            );
        }
    }

    if !response.insights.is_empty() {
        println!("\nInsights:");
        for (kind, text) in &response.insights {
            println!("  - {:?}: {}", kind, text);
        }
    }
    println!("\n{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_parses_filters_and_intent() {
        let filters = vec!["company=Hovione".to_string(), "category = audit".to_string()];
        let query = build_query("sterile audit", Some("report"), 5, &filters).unwrap();
        assert_eq!(query.intent_override(), Some(Intent::Report));
        assert_eq!(query.filters().top_k, 5);
        assert_eq!(query.filters().metadata.get("category").map(String::as_str), Some("audit"));
    }

    #[test]
    fn test_build_query_rejects_bad_input() {
        assert!(build_query("  ", None, 8, &[]).is_err());
        assert!(build_query("audit", None, 8, &["company".to_string()]).is_err());
        assert!(build_query("audit", Some("poem"), 8, &[]).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["audit-intel", "-v", "2", "classify", "-q", "FDA warning"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Classify { .. }));
    }

    #[test]
    fn test_top_k_is_optional() {
        let cli = Cli::try_parse_from(["audit-intel", "query", "-q", "audit"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { top_k: None, .. }));

        let cli = Cli::try_parse_from(["audit-intel", "query", "-q", "audit", "--top-k", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { top_k: Some(3), .. }));
    }

    #[test]
    fn test_top_k_defaults_to_configured_limit() {
        let config = OrchestratorConfig {
            max_documents_per_agent: 4,
            ..OrchestratorConfig::default()
        };
        assert_eq!(top_k_for(None, &config), 4);
        assert_eq!(top_k_for(Some(2), &config), 2);
        assert_eq!(top_k_for(None, &OrchestratorConfig::default()), 8);
    }
}
