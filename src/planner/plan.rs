use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::intelligence::architecture::DeployMethod;

/// One entry in a plan, e.g. `["aws", "ec2", "run-instances", "--image-id", "<AMI_ID>"]`.
///
/// `produces` binds a named JSON path in this command's stdout to a binding
/// name later commands reference as `<NAME>`. `on_error` is an opaque hint
/// for the executor (e.g. `"continue"`); absence means abort the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub produces: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
}

impl Command {
    pub fn new(args: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            args,
            reason: reason.into(),
            produces: IndexMap::new(),
            on_error: None,
        }
    }

    /// The CLI verb and subcommand, e.g. `("ec2", "run-instances")`, used by
    /// the validator/retention-guard to reason about launch operations
    /// without caring about the provider prefix.
    pub fn verb_subcommand(&self) -> Option<(&str, &str)> {
        match self.args.as_slice() {
            [_provider, verb, subcommand, ..] => Some((verb, subcommand)),
            _ => None,
        }
    }
}

/// An immutable, ordered command list with metadata. Produced once by the
/// planning pipeline; the executor never mutates it — resolvers produce a
/// new `Plan` value instead (spec invariant: "the plan executor never
/// mutates the plan").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub version: u32,
    pub provider: String,
    pub question: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub commands: Vec<Command>,
    /// The chosen deploy method (e.g. `ec2`, `ecs-fargate`), carried
    /// alongside the cloud `provider` so the deterministic validator and
    /// retention guard can look up this plan's required launch operations
    /// without guessing it back out of `provider`. Not part of the stable
    /// wire JSON (spec §6) — it's pipeline-internal bookkeeping.
    #[serde(skip)]
    pub method: Option<DeployMethod>,
}

impl Plan {
    pub fn new(provider: impl Into<String>, question: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            provider: provider.into(),
            question: question.into(),
            summary: String::new(),
            created_at: now,
            commands: Vec::new(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: Option<DeployMethod>) -> Self {
        self.method = method;
        self
    }

    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }

    /// Returns a new plan with `commands` replaced, preserving the
    /// immutable-plan-value discipline resolvers and repair rounds rely on.
    pub fn replacing_commands(&self, commands: Vec<Command>) -> Self {
        let mut next = self.clone();
        next.commands = commands;
        next
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Counts of `(verb, subcommand)` pairs across the plan, used by the
    /// retention guard to detect per-pair shrinkage.
    pub fn verb_subcommand_counts(&self) -> IndexMap<(String, String), usize> {
        let mut counts = IndexMap::new();
        for command in &self.commands {
            if let Some((verb, subcommand)) = command.verb_subcommand() {
                *counts.entry((verb.to_string(), subcommand.to_string())).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command() -> Command {
        let mut cmd = Command::new(
            vec!["aws".into(), "ec2".into(), "run-instances".into()],
            "launch the app host",
        );
        cmd.produces.insert("INSTANCE_ID".into(), "Instances[0].InstanceId".into());
        cmd
    }

    #[test]
    fn verb_subcommand_extracts_pair() {
        let cmd = sample_command();
        assert_eq!(cmd.verb_subcommand(), Some(("ec2", "run-instances")));
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let plan = Plan::new("aws", "deploy nginx", Utc::now()).with_commands(vec![sample_command()]);
        let json = serde_json::to_string(&plan).expect("serialize");
        let back: Plan = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(plan, back);
    }

    #[test]
    fn verb_subcommand_counts_tally_pairs() {
        let plan = Plan::new("aws", "q", Utc::now()).with_commands(vec![
            sample_command(),
            sample_command(),
            Command::new(vec!["aws".into(), "ec2".into(), "wait".into()], "wait"),
        ]);
        let counts = plan.verb_subcommand_counts();
        assert_eq!(counts[&("ec2".to_string(), "run-instances".to_string())], 2);
        assert_eq!(counts[&("ec2".to_string(), "wait".to_string())], 1);
    }
}
