//! Phase 5 — prompt synthesis (spec §4.4.5). Concatenates a one-click-deploy
//! objective header, the architecture choice, selected repo facts, and the
//! infra snapshot into the `enriched_prompt`, compressing to a
//! provider-specific char budget when necessary.

use super::architecture::ArchitectureChoice;
use super::deep_analysis::DeepAnalysis;
use super::infra_snapshot::InfraSnapshot;
use super::repo_profile::RepoProfile;

/// Open question from spec §9: heuristic, tunable, not contract.
pub const CHAR_BUDGET_GEMINI: usize = 280_000;
pub const CHAR_BUDGET_OPENAI: usize = 230_000;
pub const CHAR_BUDGET_ANTHROPIC: usize = 170_000;
pub const CHAR_BUDGET_DEFAULT: usize = 145_000;

pub fn char_budget_for(model_family: &str) -> usize {
    match model_family.to_lowercase().as_str() {
        "gemini" => CHAR_BUDGET_GEMINI,
        "openai" => CHAR_BUDGET_OPENAI,
        "anthropic" => CHAR_BUDGET_ANTHROPIC,
        _ => CHAR_BUDGET_DEFAULT,
    }
}

const SUMMARY_LINE_MARKERS: &[&str] =
    &["required", "must", "env", "port", "security", "iam", "ssm", "docker"];

pub fn synthesize(
    question: &str,
    architecture: &ArchitectureChoice,
    repo_profile: &RepoProfile,
    deep_analysis: &DeepAnalysis,
    infra_snapshot: &InfraSnapshot,
) -> String {
    let mut sections = Vec::new();
    sections.push(format!("# One-click deploy objective\n{question}"));
    sections.push(format!(
        "# Architecture choice\nprovider: {}\nmethod: {}",
        architecture.provider,
        architecture.method.as_str()
    ));
    sections.push(format!(
        "# Repository facts\nlanguage: {}\nframework: {:?}\nports: {:?}\nenv_vars: {:?}\nhas_dockerfile: {}\nhas_compose: {}",
        repo_profile.language,
        repo_profile.framework,
        repo_profile.ports,
        repo_profile.env_vars,
        repo_profile.has_dockerfile,
        repo_profile.has_compose,
    ));
    sections.push(format!(
        "# Deep analysis\nlistening_port: {:?}\nstart_command: {:?}\nexposes_http: {}\nhealth_endpoint: {:?}\nrequired_env: {:?}\noptional_env: {:?}",
        deep_analysis.listening_port,
        deep_analysis.start_command,
        deep_analysis.exposes_http,
        deep_analysis.health_endpoint,
        deep_analysis.required_env,
        deep_analysis.optional_env,
    ));
    sections.push(format!(
        "# Infra snapshot\nregion: {:?}\naccount_id: {:?}\nvpc_id: {:?}\nsubnet_ids: {:?}\nami_id: {:?}",
        infra_snapshot.region,
        infra_snapshot.account_id,
        infra_snapshot.vpc_id,
        infra_snapshot.subnet_ids,
        infra_snapshot.ami_id,
    ));

    sections.join("\n\n")
}

/// Compresses `prompt` to fit `budget` chars when it exceeds it: keeps a
/// summarized-keys block (lines mentioning any of [`SUMMARY_LINE_MARKERS`]),
/// then a head and tail slice proportional to the remaining budget (spec
/// §4.4).
pub fn compress_for_budget(prompt: &str, budget: usize) -> String {
    if prompt.len() <= budget {
        return prompt.to_string();
    }

    let summarized: Vec<&str> = prompt
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            SUMMARY_LINE_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .collect();
    let summary_block = summarized.join("\n");

    let remaining = budget.saturating_sub(summary_block.len() + 2);
    let head_len = remaining / 2;
    let tail_len = remaining - head_len;

    let head: String = prompt.chars().take(head_len).collect();
    let tail_start = prompt.len().saturating_sub(tail_len);
    let tail: String = prompt.chars().skip(tail_start).collect();

    format!("{summary_block}\n\n{head}\n...\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_are_ordered_gemini_largest() {
        assert!(CHAR_BUDGET_GEMINI > CHAR_BUDGET_OPENAI);
        assert!(CHAR_BUDGET_OPENAI > CHAR_BUDGET_ANTHROPIC);
        assert!(CHAR_BUDGET_ANTHROPIC > CHAR_BUDGET_DEFAULT);
    }

    #[test]
    fn short_prompt_is_returned_unchanged() {
        let prompt = "short prompt";
        assert_eq!(compress_for_budget(prompt, 1000), prompt);
    }

    #[test]
    fn long_prompt_is_compressed_under_budget() {
        let long = "required env line\n".repeat(2000) + &"filler ".repeat(50_000);
        let compressed = compress_for_budget(&long, 5_000);
        assert!(compressed.len() <= long.len());
        assert!(compressed.contains("required env line"));
    }
}
