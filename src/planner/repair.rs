//! Repair + Retention Guard (spec §4.8). A bounded loop that asks the LLM
//! to patch the current plan using `hard` issues + fixes, then enforces the
//! retention guard before accepting the candidate. The guard is the only
//! component in the pipeline allowed to silently reject an LLM output —
//! everything else surfaces what it found (spec §9).

use serde::Deserialize;

use crate::error::Result;
use crate::llm::LlmClient;

use super::plan::{Command, Plan};
use super::validator::{LAUNCH_OPERATIONS, validate_deterministic};
use crate::intelligence::architecture::DeployMethod;
use crate::intelligence::{DeepAnalysis, DockerFacts, RepoProfile};

const REMOVAL_KEYWORDS: &[&str] =
    &["remove", "delete", "drop", "orphan", "unused", "redundant", "duplicate", "not used"];

fn mentions_removal(issues_and_fixes: &str) -> bool {
    let lower = issues_and_fixes.to_lowercase();
    REMOVAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Outcome of one retention-guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Accepted,
    Rejected(String),
}

/// Enforces the four retention-guard rules from spec §4.8 against a
/// candidate repaired plan, given the baseline it's repairing and the
/// combined issue/fix text that justified the repair round.
pub fn retention_guard(
    baseline: &Plan,
    candidate: &Plan,
    issues_and_fixes: &str,
    method: Option<DeployMethod>,
) -> GuardVerdict {
    if candidate.is_empty() {
        return GuardVerdict::Rejected("candidate plan is empty".to_string());
    }

    let removal_intent = mentions_removal(issues_and_fixes);
    let baseline_len = baseline.len();
    let candidate_len = candidate.len();

    if candidate_len < baseline_len {
        if !removal_intent {
            return GuardVerdict::Rejected(format!(
                "candidate shrank from {baseline_len} to {candidate_len} commands with no removal intent in issues/fixes"
            ));
        }
        let removed = baseline_len - candidate_len;
        let max_removable = (baseline_len / 4).max(2);
        if removed > max_removable {
            return GuardVerdict::Rejected(format!(
                "candidate removed {removed} commands, exceeding the max of {max_removable}"
            ));
        }
    }

    let baseline_counts = baseline.verb_subcommand_counts();
    let candidate_counts = candidate.verb_subcommand_counts();
    for (pair, baseline_count) in &baseline_counts {
        let candidate_count = candidate_counts.get(pair).copied().unwrap_or(0);
        if candidate_count < *baseline_count {
            let pair_text = format!("{} {}", pair.0, pair.1);
            if !issues_and_fixes.to_lowercase().contains(&pair_text.to_lowercase()) {
                return GuardVerdict::Rejected(format!(
                    "per-pair count for '{pair_text}' decreased ({baseline_count} -> {candidate_count}) without it being referenced in issues/fixes"
                ));
            }
        }
    }

    if let Some(method) = method
        && !launch_operation_present(candidate, method)
    {
        return GuardVerdict::Rejected(format!(
            "candidate no longer contains a required launch operation for {}",
            method.as_str()
        ));
    }

    GuardVerdict::Accepted
}

fn launch_operation_present(plan: &Plan, method: DeployMethod) -> bool {
    let pairs: &[(&str, &str)] = LAUNCH_OPERATIONS
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, pairs)| *pairs)
        .unwrap_or(&[]);
    pairs.iter().all(|pair| {
        plan.commands.iter().any(|cmd| {
            cmd.verb_subcommand()
                .map(|(v, s)| v == pair.0 && (pair.1.is_empty() || s == pair.1))
                .unwrap_or(false)
        })
    })
}

#[derive(Deserialize)]
struct RepairResponse {
    commands: Vec<Command>,
    #[serde(default)]
    summary: Option<String>,
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

/// Result of the bounded repair loop.
pub struct RepairOutcome {
    pub plan: Plan,
    pub rounds_used: usize,
    /// True when the loop exhausted every round without an accepted
    /// candidate and fell back to the best (baseline) plan.
    pub exhausted: bool,
    pub warnings: Vec<String>,
}

/// Runs up to `max_rounds` repair attempts against `baseline`, using the
/// `hard` issues and their fixes as the LLM's patch instructions. Each
/// candidate is checked by the retention guard; a rejected candidate is
/// discarded and the baseline carries into the next round unchanged.
pub async fn repair(
    llm: &dyn LlmClient,
    baseline: &Plan,
    hard_issues: &[String],
    fixes: &[String],
    method: Option<DeployMethod>,
    repo_profile: &RepoProfile,
    deep_analysis: &DeepAnalysis,
    docker_facts: &DockerFacts,
    max_rounds: usize,
) -> Result<RepairOutcome> {
    if hard_issues.is_empty() {
        return Ok(RepairOutcome { plan: baseline.clone(), rounds_used: 0, exhausted: false, warnings: Vec::new() });
    }

    let issues_and_fixes = format!("{}\n{}", hard_issues.join("\n"), fixes.join("\n"));
    let mut current = baseline.clone();

    for round in 0..max_rounds {
        let prompt = format!(
            "Patch this plan to resolve the issues below without deleting \
             commands unless explicitly justified. Respond as JSON \
             {{\"commands\":[...], \"summary\": \"...\"}}.\n\
             issues:\n{}\nfixes:\n{}\n\ncurrent plan:\n{}",
            hard_issues.join("\n"),
            fixes.join("\n"),
            serde_json::to_string_pretty(&current).unwrap_or_default(),
        );
        let response = llm.ask(&prompt).await?;
        let Ok(parsed) = serde_json::from_str::<RepairResponse>(strip_code_fences(&response)) else {
            continue;
        };

        let candidate = current.replacing_commands(parsed.commands);
        match retention_guard(baseline, &candidate, &issues_and_fixes, method) {
            GuardVerdict::Accepted => {
                let still_valid = validate_deterministic(&candidate, repo_profile, deep_analysis, docker_facts);
                if still_valid.is_valid {
                    return Ok(RepairOutcome {
                        plan: candidate,
                        rounds_used: round + 1,
                        exhausted: false,
                        warnings: Vec::new(),
                    });
                }
                current = candidate;
            }
            GuardVerdict::Rejected(_reason) => {
                // Discard; baseline-derived `current` carries into the next round.
            }
        }
    }

    Ok(RepairOutcome {
        plan: current,
        rounds_used: max_rounds,
        exhausted: true,
        warnings: vec!["repair rounds exhausted without a fully valid candidate".to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use chrono::Utc;

    fn ec2_command() -> Command {
        Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into()], "launch")
    }

    fn baseline_with(n: usize) -> Plan {
        let mut commands = vec![ec2_command()];
        for i in 0..n {
            commands.push(Command::new(vec!["aws".into(), "ec2".into(), "wait".into(), i.to_string()], "wait"));
        }
        Plan::new("ec2", "deploy", Utc::now()).with_commands(commands)
    }

    #[test]
    fn s4_retention_guard_rejects_shrinkage_without_removal_intent() {
        let baseline = baseline_with(11); // 12 commands total including the ec2 run-instances
        let candidate = baseline.replacing_commands(baseline.commands[..7].to_vec());
        let verdict = retention_guard(&baseline, &candidate, "no removal words here", Some(DeployMethod::Ec2));
        assert_eq!(verdict, GuardVerdict::Rejected(
            "candidate shrank from 12 to 7 commands with no removal intent in issues/fixes".to_string()
        ));
    }

    #[test]
    fn retention_guard_rejects_when_launch_operation_dropped_even_with_removal_intent() {
        let baseline = baseline_with(11); // 12 commands: 1 run-instances + 11 wait
        let without_launch: Vec<Command> = baseline.commands[1..].to_vec(); // drops only run-instances
        let candidate = baseline.replacing_commands(without_launch);
        let verdict = retention_guard(
            &baseline,
            &candidate,
            "remove the redundant duplicate ec2 run-instances call",
            Some(DeployMethod::Ec2),
        );
        match verdict {
            GuardVerdict::Rejected(reason) => assert!(reason.contains("launch operation")),
            GuardVerdict::Accepted => panic!("expected rejection"),
        }
    }

    #[test]
    fn retention_guard_accepts_justified_bounded_removal() {
        let baseline = baseline_with(11); // 12 commands
        let mut commands = baseline.commands.clone();
        commands.truncate(10); // remove 2, within max(12/4, 2) == 3
        let candidate = baseline.replacing_commands(commands);
        let verdict = retention_guard(&baseline, &candidate, "remove the two unused ec2 wait steps", Some(DeployMethod::Ec2));
        assert_eq!(verdict, GuardVerdict::Accepted);
    }

    #[tokio::test]
    async fn repair_skips_llm_entirely_when_no_hard_issues() {
        let llm = MockLlmClient::new(Vec::<String>::new());
        let baseline = baseline_with(1);
        let outcome = repair(
            &llm,
            &baseline,
            &[],
            &[],
            Some(DeployMethod::Ec2),
            &RepoProfile::default(),
            &DeepAnalysis::default(),
            &DockerFacts::default(),
            3,
        )
        .await
        .unwrap();
        assert_eq!(outcome.rounds_used, 0);
        assert_eq!(outcome.plan, baseline);
    }
}
