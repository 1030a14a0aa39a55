use std::env;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use clanker::capability::CapabilityRegistry;
use clanker::capability::runner::DefaultCommandRunner;
use clanker::config::{CliArgs, ClankerConfig, OutputFormat};
use clanker::llm::{HttpLlmClient, LlmClient};
use clanker::{investigation, pipeline, telemetry};

/// Pulls a repo URL out of the utterance, since CLI flag plumbing beyond
/// routing is out of scope (spec.md §1): a bare `https://` link or a
/// `host.tld/org/repo`-shaped token is taken as the deploy target.
fn extract_repo_url(utterance: &str) -> Option<String> {
    utterance.split_whitespace().find_map(|token| {
        let trimmed = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/' && c != ':' && c != '.' && c != '-' && c != '_');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Some(trimmed.to_string())
        } else if trimmed.starts_with("github.com/") || trimmed.starts_with("gitlab.com/") {
            Some(format!("https://{trimmed}"))
        } else {
            None
        }
    })
}

fn build_llm_client() -> Arc<dyn LlmClient> {
    let endpoint = env::var("CLANKER_LLM_ENDPOINT").unwrap_or_else(|_| "http://localhost:11434/v1/chat/completions".to_string());
    let model = env::var("CLANKER_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let api_key = env::var("CLANKER_LLM_API_KEY").ok();
    Arc::new(HttpLlmClient::new(endpoint, model, api_key))
}

fn print_outcome(outcome: &pipeline::Outcome, output: OutputFormat) {
    match outcome {
        pipeline::Outcome::Investigation(result) => {
            let payload = serde_json::json!({
                "intent": result.intent.primary,
                "decision_path": result.decision_path,
                "results": result.results,
                "total": result.metadata.total,
                "completed": result.metadata.completed,
                "failed": result.metadata.failed,
            });
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default()),
                OutputFormat::Yaml => println!("{}", serde_yaml_bw::to_string(&payload).unwrap_or_default()),
                OutputFormat::Text => {
                    println!("intent: {}", result.intent.primary);
                    println!("decision path: {}", result.decision_path.join(" -> "));
                    println!("agents: {} completed, {} failed (of {})", result.metadata.completed, result.metadata.failed, result.metadata.total);
                    for (agent, value) in &result.results {
                        println!("- {agent}: {value}");
                    }
                }
            }
        }
        pipeline::Outcome::Plan { plan, warnings } => {
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan).unwrap_or_default()),
                OutputFormat::Yaml => println!("{}", serde_yaml_bw::to_string(plan).unwrap_or_default()),
                OutputFormat::Text => {
                    println!("plan for {} ({} commands):", plan.provider, plan.len());
                    for (i, command) in plan.commands.iter().enumerate() {
                        println!("  {}. {} ({})", i + 1, command.args.join(" "), command.reason);
                    }
                }
            }
            for warning in warnings {
                eprintln!("warning: {warning}");
            }
        }
        pipeline::Outcome::Applied { plan, summary, warnings } => {
            println!("applied plan for {} ({} commands)", plan.provider, plan.len());
            for outcome in &summary.outcomes {
                println!("  {}. {} -> {}", outcome.index, outcome.args.join(" "), if outcome.succeeded { "ok" } else { "failed" });
            }
            if let Some(endpoint) = &summary.resolved_endpoint {
                println!("endpoint: {endpoint}");
            }
            if let Some(healthy) = summary.health_check_passed {
                println!("health check: {}", if healthy { "passed" } else { "did not pass within the poll window" });
            }
            for warning in warnings {
                eprintln!("warning: {warning}");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = match ClankerConfig::from_env_and_args(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = telemetry::init() {
        eprintln!("telemetry init failed: {err}");
    }
    info!(utterance = %config.utterance, mode = ?config.mode, "starting clanker request");

    let runner = Arc::new(DefaultCommandRunner);
    let registry = Arc::new(CapabilityRegistry::new(runner));
    let llm = build_llm_client();
    let tree = investigation::default_decision_tree();
    let repo_url = extract_repo_url(&config.utterance);

    match pipeline::run_request(&config, &tree, registry, llm, repo_url.as_deref()).await {
        Ok(outcome) => print_outcome(&outcome, config.output),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
