//! Binding & Placeholder Resolver (spec §4.9). Two stages: apply static
//! infra bindings unconditionally, then iteratively resolve `<TOKEN>`
//! placeholders, asking the LLM for proposals when a token isn't produced
//! by any earlier command. A final one-shot pass rewrites any remaining
//! `${TOKEN}` shell-style placeholders into `<TOKEN>` form.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{ClankerError, Result};
use crate::intelligence::InfraSnapshot;
use crate::llm::LlmClient;
use crate::planner::plan::Plan;

/// Default round cap, overridable via [`crate::config::ClankerConfig`].
pub const DEFAULT_MAX_PLACEHOLDER_ROUNDS: usize = 5;

/// Extracts every `<TOKEN>` appearing in a command's args.
fn angle_tokens(arg: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = arg;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        if let Some(end) = after.find('>') {
            out.push(after[..end].to_string());
            rest = &after[end + 1..];
        } else {
            break;
        }
    }
    out
}

fn collect_unresolved(plan: &Plan, bindings: &IndexMap<String, String>) -> BTreeSet<String> {
    let mut unresolved = BTreeSet::new();
    for command in &plan.commands {
        for arg in &command.args {
            for token in angle_tokens(arg) {
                if !bindings.contains_key(&token) {
                    unresolved.insert(token);
                }
            }
        }
    }
    unresolved
}

/// True when every name in `tokens` is produced by *some* command in the
/// plan — they'll resolve at runtime, so the resolver doesn't need to bind
/// them statically (spec §4.9).
fn all_produced_somewhere(plan: &Plan, tokens: &BTreeSet<String>) -> bool {
    tokens.iter().all(|token| {
        plan.commands.iter().any(|cmd| cmd.produces.contains_key(token))
    })
}

fn substitute(arg: &str, bindings: &IndexMap<String, String>) -> String {
    let mut out = arg.to_string();
    for (name, value) in bindings {
        out = out.replace(&format!("<{name}>"), value);
    }
    out
}

#[derive(Deserialize, Default)]
struct BindingProposal {
    #[serde(default)]
    bindings: IndexMap<String, String>,
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

async fn propose_bindings(
    llm: &dyn LlmClient,
    unresolved: &BTreeSet<String>,
    infra_snapshot: &InfraSnapshot,
) -> Result<IndexMap<String, String>> {
    let prompt = format!(
        "Given this infra snapshot, propose string values for these \
         placeholder tokens. Respond as JSON {{\"bindings\":{{\"TOKEN\":\"value\"}}}}.\n\
         tokens: {:?}\ninfra snapshot: {infra_snapshot:?}",
        unresolved
    );
    let response = llm.ask(&prompt).await?;
    let parsed: BindingProposal = serde_json::from_str(strip_code_fences(&response))
        .map_err(|err| ClankerError::InvalidPlan(format!("binding proposal parse failed: {err}")))
        .unwrap_or_default();
    Ok(parsed.bindings)
}

/// Stage one: seed `bindings` with the infra snapshot's static facts,
/// unconditionally. Returns the (possibly already-populated) map so callers
/// can pre-seed user config before calling this.
pub fn apply_static_bindings(bindings: &mut IndexMap<String, String>, infra_snapshot: &InfraSnapshot) {
    for (key, value) in infra_snapshot.static_bindings() {
        bindings.entry(key).or_insert(value);
    }
}

/// Stage two: resolves `<TOKEN>` placeholders iteratively, up to
/// `max_rounds`. Returns a brand-new `Plan` with resolved args substituted in
/// place — the resolver never mutates its input (spec invariant: "the plan
/// executor never mutates the plan"; the resolver follows the same
/// discipline).
pub async fn resolve_placeholders(
    llm: &dyn LlmClient,
    plan: &Plan,
    bindings: &mut IndexMap<String, String>,
    infra_snapshot: &InfraSnapshot,
    max_rounds: usize,
) -> Result<Plan> {
    for _ in 0..max_rounds {
        let unresolved = collect_unresolved(plan, bindings);
        if unresolved.is_empty() || all_produced_somewhere(plan, &unresolved) {
            break;
        }
        let proposed = propose_bindings(llm, &unresolved, infra_snapshot).await?;
        if proposed.is_empty() {
            break;
        }
        for (key, value) in proposed {
            bindings.entry(key).or_insert(value);
        }
    }

    let commands = plan
        .commands
        .iter()
        .map(|command| {
            let mut next = command.clone();
            next.args = next.args.iter().map(|arg| substitute(arg, bindings)).collect();
            next
        })
        .collect();

    Ok(plan.replacing_commands(commands))
}

/// Rewrites any remaining `${TOKEN}` shell-style placeholder into `<TOKEN>`
/// form, unless the argument looks like an inline script: starts with `#!`
/// or `#cloud-config`, or contains a newline (spec testable property #8).
pub fn rewrite_shell_placeholders(plan: &Plan) -> Plan {
    let commands = plan
        .commands
        .iter()
        .map(|command| {
            let mut next = command.clone();
            next.args = next
                .args
                .iter()
                .map(|arg| {
                    let looks_like_script =
                        arg.starts_with("#!") || arg.starts_with("#cloud-config") || arg.contains('\n');
                    if looks_like_script {
                        arg.clone()
                    } else {
                        rewrite_one(arg)
                    }
                })
                .collect();
            next
        })
        .collect();
    plan.replacing_commands(commands)
}

fn rewrite_one(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            out.push('<');
            out.push_str(&after[..end]);
            out.push('>');
            rest = &after[end + 1..];
        } else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::planner::plan::Command;
    use chrono::Utc;

    fn plan_with(commands: Vec<Command>) -> Plan {
        Plan::new("aws", "deploy", Utc::now()).with_commands(commands)
    }

    #[test]
    fn angle_tokens_extracts_all_tokens_in_an_arg() {
        assert_eq!(angle_tokens("<A>-<B>"), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(angle_tokens("no tokens here"), Vec::<String>::new());
    }

    #[test]
    fn shell_rewrite_is_a_noop_on_scripts() {
        let script = "#!/bin/bash\necho ${NAME}".to_string();
        let plan = plan_with(vec![Command::new(
            vec!["aws".into(), "ec2".into(), "run-instances".into(), "--user-data".into(), script.clone()],
            "launch",
        )]);
        let rewritten = rewrite_shell_placeholders(&plan);
        assert_eq!(rewritten.commands[0].args[4], script);
    }

    #[test]
    fn shell_rewrite_converts_plain_dollar_brace_tokens() {
        let plan = plan_with(vec![Command::new(
            vec!["aws".into(), "ec2".into(), "create-tags".into(), "--tag".into(), "${NAME}".into()],
            "tag",
        )]);
        let rewritten = rewrite_shell_placeholders(&plan);
        assert_eq!(rewritten.commands[0].args[4], "<NAME>");
    }

    #[tokio::test]
    async fn s5_static_bindings_resolve_vpc_id_immediately() {
        let llm = MockLlmClient::new(Vec::<String>::new());
        let plan = plan_with(vec![Command::new(
            vec!["aws".into(), "ec2".into(), "create-subnet".into(), "--vpc-id".into(), "<VPC_ID>".into()],
            "subnet",
        )]);
        let snapshot = InfraSnapshot { vpc_id: Some("vpc-abc123".to_string()), ..Default::default() };
        let mut bindings = IndexMap::new();
        apply_static_bindings(&mut bindings, &snapshot);

        let resolved = resolve_placeholders(&llm, &plan, &mut bindings, &snapshot, DEFAULT_MAX_PLACEHOLDER_ROUNDS)
            .await
            .unwrap();
        assert_eq!(resolved.commands[0].args[4], "vpc-abc123");
    }

    #[tokio::test]
    async fn s5_token_produced_by_earlier_command_is_left_unresolved() {
        let llm = MockLlmClient::new(Vec::<String>::new());
        let mut producing = Command::new(
            vec!["aws".into(), "ec2".into(), "run-instances".into()],
            "launch",
        );
        producing.produces.insert("INSTANCE_ID".to_string(), "Instances[0].InstanceId".to_string());
        let consuming = Command::new(
            vec!["aws".into(), "ec2".into(), "create-tags".into(), "--resource".into(), "<INSTANCE_ID>".into()],
            "tag",
        );
        let plan = plan_with(vec![producing, consuming]);

        let snapshot = InfraSnapshot::default();
        let mut bindings = IndexMap::new();
        let resolved = resolve_placeholders(&llm, &plan, &mut bindings, &snapshot, DEFAULT_MAX_PLACEHOLDER_ROUNDS)
            .await
            .unwrap();
        assert_eq!(resolved.commands[1].args[4], "<INSTANCE_ID>");
    }
}
