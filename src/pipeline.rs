//! Top-level orchestration: utterance -> Router -> {Investigation |
//! Planner -> Validator/Repair -> Resolver -> Executor} (spec §2).

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::capability::CapabilityRegistry;
use crate::config::{ClankerConfig, Mode};
use crate::error::{ClankerError, Result};
use crate::executor::{ExecutionSummary, PlanExecutor};
use crate::intelligence::{self, IntelligenceBundle};
use crate::investigation::{self, InvestigationResult};
use crate::llm::LlmClient;
use crate::planner::llm_validator::{merge_reports, triage, validate_with_llm};
use crate::planner::paged::run_paged_planner;
use crate::planner::plan::Plan;
use crate::planner::repair::repair;
use crate::resolver::{apply_static_bindings, resolve_placeholders, rewrite_shell_placeholders};
use crate::router::{RouteDestination, route};

pub enum Outcome {
    Investigation(InvestigationResult),
    Plan { plan: Plan, warnings: Vec<String> },
    Applied { plan: Plan, summary: ExecutionSummary, warnings: Vec<String> },
}

/// The `deploy` path: gathers intelligence, pages a plan, validates/repairs
/// it, resolves bindings/placeholders, and — in apply mode — executes it.
pub async fn run_deploy(
    config: &ClankerConfig,
    repo_url: &str,
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmClient>,
    user_bindings: IndexMap<String, String>,
) -> Result<Outcome> {
    let deadline = Duration::from_secs(config.deadline_minutes * 60);

    let bundle: IntelligenceBundle =
        intelligence::gather(repo_url, &config.utterance, registry.clone(), llm.clone(), deadline).await?;

    let method = Some(bundle.architecture_choice.method);
    let paged = run_paged_planner(
        llm.as_ref(),
        &bundle.architecture_choice.provider,
        &bundle.enriched_prompt,
        method,
        &bundle.repo_profile,
        &bundle.deep_analysis,
        &bundle.docker_facts,
        chrono::Utc::now(),
        config.max_pages,
        config.max_per_page,
    )
    .await;

    let paged = match paged {
        Ok(paged) => paged,
        Err(err) if matches!(config.mode, Mode::PlanOnly) => {
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    if paged.stuck && paged.plan.is_empty() && matches!(config.mode, Mode::Apply) {
        return Err(ClankerError::PlanningFailed("failed to generate a plan".to_string()));
    }

    let deterministic = crate::planner::validator::validate_deterministic(
        &paged.plan,
        &bundle.repo_profile,
        &bundle.deep_analysis,
        &bundle.docker_facts,
    );
    let llm_report = validate_with_llm(llm.as_ref(), &paged.plan, &bundle.enriched_prompt).await?;
    let merged = merge_reports(&deterministic, &llm_report);
    let triaged = triage(&merged.issues);

    let mut plan = paged.plan;
    let mut warnings = paged.warnings;
    warnings.extend(merged.warnings.clone());

    if !triaged.hard.is_empty() {
        let outcome = repair(
            llm.as_ref(),
            &plan,
            &triaged.hard,
            &merged.fixes,
            method,
            &bundle.repo_profile,
            &bundle.deep_analysis,
            &bundle.docker_facts,
            config.repair_rounds,
        )
        .await?;
        plan = outcome.plan;
        warnings.extend(outcome.warnings);
        if outcome.exhausted && matches!(config.mode, Mode::Apply) {
            return Err(ClankerError::PlanningFailed(
                "repair rounds exhausted without a valid plan".to_string(),
            ));
        }
    }

    let mut bindings = user_bindings;
    apply_static_bindings(&mut bindings, &bundle.infra_snapshot);
    if let Some(health_endpoint) = &bundle.deep_analysis.health_endpoint {
        bindings.entry("HEALTH_ENDPOINT".to_string()).or_insert_with(|| health_endpoint.clone());
    }
    plan = resolve_placeholders(llm.as_ref(), &plan, &mut bindings, &bundle.infra_snapshot, config.placeholder_rounds)
        .await?;
    plan = rewrite_shell_placeholders(&plan);

    match config.mode {
        Mode::PlanOnly => Ok(Outcome::Plan { plan, warnings }),
        Mode::Apply => {
            let executor = PlanExecutor::new(registry);
            let summary = executor.execute(&plan, bindings, bundle.docker_facts.has_dockerfile).await?;
            Ok(Outcome::Applied { plan, summary, warnings })
        }
    }
}

/// Runs a full request: route the utterance, then dispatch to the
/// investigation engine for read-only destinations or the plan pipeline
/// for `deploy`-shaped utterances (a `maker`/`k8s_maker` destination whose
/// intent is `deploy`).
pub async fn run_request(
    config: &ClankerConfig,
    tree: &crate::decision::DecisionTree,
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmClient>,
    repo_url: Option<&str>,
) -> Result<Outcome> {
    let destination = route(&config.utterance);
    let provider = config.provider_hint.map(|p| p.as_str()).unwrap_or("aws");
    let deadline = Duration::from_secs(config.deadline_minutes * 60);

    match destination {
        RouteDestination::Maker | RouteDestination::K8sMaker => {
            if let Some(repo_url) = repo_url {
                run_deploy(config, repo_url, registry, llm, IndexMap::new()).await
            } else {
                let result = investigation::investigate(&config.utterance, tree, registry, provider, deadline).await?;
                Ok(Outcome::Investigation(result))
            }
        }
        RouteDestination::Diagram | RouteDestination::K8s | RouteDestination::Cli => {
            let result = investigation::investigate(&config.utterance, tree, registry, provider, deadline).await?;
            Ok(Outcome::Investigation(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::runner::{CommandOutput, MockCommandRunner};
    use crate::config::{CliArgs, OutputFormat};
    use crate::llm::MockLlmClient;
    use clap::Parser;

    fn base_config(utterance: &str) -> ClankerConfig {
        let cli = CliArgs::parse_from(vec!["clanker", utterance]);
        ClankerConfig::from_env_and_args(cli).unwrap()
    }

    #[tokio::test]
    async fn cli_destination_runs_investigation() {
        let runner: Arc<dyn crate::capability::runner::CommandRunner> =
            Arc::new(MockCommandRunner::new(vec![CommandOutput { stdout: "{}".into(), stderr: String::new(), status: Some(0) }]));
        let registry = Arc::new(CapabilityRegistry::new(runner));
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(Vec::<String>::new()));
        let tree = investigation::default_decision_tree();
        let config = base_config("what EC2 instances are running?");

        let outcome = run_request(&config, &tree, registry, llm, None).await.unwrap();
        assert!(matches!(outcome, Outcome::Investigation(_)));
    }

    #[test]
    fn output_format_default_is_text() {
        let config = base_config("list pods in prod");
        assert!(matches!(config.output, OutputFormat::Text));
    }
}
