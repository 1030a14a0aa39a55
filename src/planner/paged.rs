//! Paged Planner (spec §4.5). Calls the LLM repeatedly to extend a plan
//! page by page, with normalization, parse-repair, and stuck detection.

use serde::Deserialize;

use crate::error::{ClankerError, Result};
use crate::intelligence::{DeepAnalysis, DockerFacts, RepoProfile};
use crate::intelligence::architecture::DeployMethod;
use crate::llm::LlmClient;

use super::plan::{Command, Plan};
use super::validator::validate_deterministic;

/// Defaults for the page-count / per-page-command bounds (spec §4.5,
/// §5). Overridable per request via [`crate::config::ClankerConfig`].
pub const DEFAULT_MAX_PER_PAGE: usize = 8;
pub const DEFAULT_MAX_PAGES: usize = 20;
const MAX_CONSECUTIVE_PARSE_FAILURES: usize = 3;
const MAX_STUCK_STREAK: usize = 3;

#[derive(Debug, Clone)]
struct FormatHint {
    strict: bool,
}

impl FormatHint {
    fn instructions(&self) -> &'static str {
        if self.strict {
            "Respond with ONLY a single JSON object, no prose, no code fences: \
             {\"done\":bool,\"commands\":[{\"args\":[string,...],\"reason\":string,\
             \"produces\":{},\"on_error\":null}],\"summary\":string}. `args` must be \
             an array of plain strings only."
        } else {
            "Respond as JSON: {\"done\":bool,\"commands\":[{\"args\":[...],\"reason\":\"...\"}],\"summary\":\"...\"}."
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    done: bool,
    #[serde(default)]
    commands: Vec<Command>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

/// Round-trips a page's commands through the strict command parser:
/// serialize then re-parse. A command is valid only if it survives this
/// loop unchanged (spec testable property #7: normalization is idempotent).
fn normalize_commands(commands: Vec<Command>) -> Result<Vec<Command>> {
    let json = serde_json::to_string(&commands)
        .map_err(|err| ClankerError::InvalidPlan(format!("failed to serialize page commands: {err}")))?;
    let reparsed: Vec<Command> = serde_json::from_str(&json)
        .map_err(|err| ClankerError::InvalidPlan(format!("failed to round-trip page commands: {err}")))?;
    if reparsed != commands {
        return Err(ClankerError::InvalidPlan("command normalization was not idempotent".to_string()));
    }
    Ok(reparsed)
}

fn parse_page(response: &str) -> Result<PageResponse> {
    serde_json::from_str(strip_code_fences(response))
        .map_err(|err| ClankerError::InvalidPlan(format!("page response parse failed: {err}")))
}

pub struct PagedPlanResult {
    pub plan: Plan,
    pub pages_used: usize,
    pub stuck: bool,
    pub warnings: Vec<String>,
}

fn build_page_prompt(
    provider: &str,
    enriched_prompt: &str,
    plan_so_far: &Plan,
    must_fix: &[String],
    method: Option<DeployMethod>,
    max_per_page: usize,
    hint: &FormatHint,
) -> String {
    let required_ops = method
        .map(|m| format!("{:?}", m))
        .unwrap_or_else(|| "unspecified".to_string());
    let accumulated = serde_json::to_string_pretty(&plan_so_far.commands).unwrap_or_default();
    let must_fix_block = if must_fix.is_empty() {
        "none".to_string()
    } else {
        must_fix.join("\n")
    };
    format!(
        "Extend this infrastructure plan by at most {max_per_page} commands.\n\
         provider: {provider}\n\
         required launch operations for method: {required_ops}\n\
         outstanding must_fix issues:\n{must_fix_block}\n\n\
         commands accumulated so far (read-only, do not repeat):\n{accumulated}\n\n\
         context:\n{enriched_prompt}\n\n\
         {}",
        hint.instructions()
    )
}

/// Runs the page loop, mutating nothing outside its own return value
/// (plans are immutable once emitted, spec §3). In plan-only mode a stuck
/// exit is non-fatal; callers in apply mode should surface a
/// `PlanningFailed` error if the resulting plan is still empty.
pub async fn run_paged_planner(
    llm: &dyn LlmClient,
    provider: &str,
    enriched_prompt: &str,
    method: Option<DeployMethod>,
    repo_profile: &RepoProfile,
    deep_analysis: &DeepAnalysis,
    docker_facts: &DockerFacts,
    now: chrono::DateTime<chrono::Utc>,
    max_pages: usize,
    max_per_page: usize,
) -> Result<PagedPlanResult> {
    let mut plan = Plan::new(provider, enriched_prompt.lines().next().unwrap_or(""), now).with_method(method);
    let mut hint = FormatHint { strict: false };
    let mut consecutive_parse_failures = 0usize;
    let mut zero_growth_streak = 0usize;
    let mut must_fix: Vec<String> = Vec::new();
    let mut stuck = false;
    let mut warnings = Vec::new();
    let mut pages_used = 0usize;

    for _ in 0..max_pages {
        pages_used += 1;
        let prompt = build_page_prompt(provider, enriched_prompt, &plan, &must_fix, method, max_per_page, &hint);
        let response = llm.ask(&prompt).await?;

        let page = match parse_page(&response) {
            Ok(page) => page,
            Err(_) => {
                consecutive_parse_failures += 1;
                hint = FormatHint { strict: true };
                if consecutive_parse_failures >= MAX_CONSECUTIVE_PARSE_FAILURES {
                    if plan.is_empty() {
                        return Err(ClankerError::PlanningFailed(
                            "exhausted parse retries with an empty plan".to_string(),
                        ));
                    }
                    warnings.push("switched to deterministic repair after repeated parse failures".to_string());
                    break;
                }
                continue;
            }
        };

        let normalized = match normalize_commands(page.commands) {
            Ok(commands) => {
                consecutive_parse_failures = 0;
                commands
            }
            Err(_) => {
                consecutive_parse_failures += 1;
                hint = FormatHint { strict: true };
                if consecutive_parse_failures >= MAX_CONSECUTIVE_PARSE_FAILURES {
                    if plan.is_empty() {
                        return Err(ClankerError::PlanningFailed(
                            "exhausted normalization retries with an empty plan".to_string(),
                        ));
                    }
                    warnings.push("switched to deterministic repair after repeated normalization failures".to_string());
                    break;
                }
                continue;
            }
        };

        let clamped: Vec<Command> = normalized.into_iter().take(max_per_page).collect();
        let added = clamped.len();

        let mut commands = plan.commands.clone();
        commands.extend(clamped);
        plan = plan.replacing_commands(commands);
        if let Some(summary) = page.summary {
            plan.summary = summary;
        }
        let _ = page.notes;

        let report = if provider == "aws" || method.is_some() {
            validate_deterministic(&plan, repo_profile, deep_analysis, docker_facts)
        } else {
            Default::default()
        };
        must_fix = report.issues;

        if added == 0 && !must_fix.is_empty() {
            zero_growth_streak += 1;
            if zero_growth_streak >= MAX_STUCK_STREAK {
                stuck = true;
                warnings.push("planner stuck: pages added no commands while hard issues remained".to_string());
                break;
            }
        } else {
            zero_growth_streak = 0;
        }

        if page.done {
            break;
        }
    }

    Ok(PagedPlanResult { plan, pages_used, stuck, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn normalize_commands_round_trips_idempotently() {
        let commands = vec![Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into()], "launch")];
        let normalized = normalize_commands(commands.clone()).unwrap();
        assert_eq!(normalized, commands);
    }

    #[tokio::test]
    async fn s3_three_empty_pages_with_must_fix_marks_stuck() {
        let empty_page = r#"{"done":false,"commands":[]}"#.to_string();
        // First page seeds a must_fix issue by returning a command missing run-instances;
        // but to hit the exact S1 scenario we start with must_fix via an initial stub page
        // that itself has zero commands and the validator has nothing to flag yet, so we
        // seed must_fix with a first page that adds a harmless describe call.
        let seed_page = r#"{"done":false,"commands":[{"args":["aws","ec2","describe-instances"],"reason":"look around"}]}"#.to_string();
        let llm = MockLlmClient::new([
            seed_page,
            empty_page.clone(),
            empty_page.clone(),
            empty_page,
        ]);

        let result = run_paged_planner(
            &llm,
            "aws",
            "deploy nginx",
            Some(DeployMethod::Ec2),
            &RepoProfile::default(),
            &DeepAnalysis::default(),
            &DockerFacts::default(),
            chrono::Utc::now(),
            DEFAULT_MAX_PAGES,
            DEFAULT_MAX_PER_PAGE,
        )
        .await
        .unwrap();

        assert!(result.stuck);
        assert_eq!(result.plan.len(), 1);
    }

    #[tokio::test]
    async fn parse_failure_switches_to_strict_hint_and_eventually_breaks() {
        let llm = MockLlmClient::new([
            "not json".to_string(),
            "still not json".to_string(),
            "still not json".to_string(),
        ]);
        let err = run_paged_planner(
            &llm,
            "aws",
            "deploy nginx",
            Some(DeployMethod::Ec2),
            &RepoProfile::default(),
            &DeepAnalysis::default(),
            &DockerFacts::default(),
            chrono::Utc::now(),
            DEFAULT_MAX_PAGES,
            DEFAULT_MAX_PER_PAGE,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClankerError::PlanningFailed(_)));
    }

    #[tokio::test]
    async fn done_flag_ends_the_loop_early() {
        let llm = MockLlmClient::new([
            r#"{"done":true,"commands":[{"args":["aws","ec2","run-instances"],"reason":"launch"}]}"#.to_string(),
        ]);
        let result = run_paged_planner(
            &llm,
            "aws",
            "deploy nginx",
            Some(DeployMethod::Ec2),
            &RepoProfile::default(),
            &DeepAnalysis::default(),
            &DockerFacts::default(),
            chrono::Utc::now(),
            DEFAULT_MAX_PAGES,
            DEFAULT_MAX_PER_PAGE,
        )
        .await
        .unwrap();
        assert_eq!(result.pages_used, 1);
        assert_eq!(result.plan.len(), 1);
    }
}
