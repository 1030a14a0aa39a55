//! The Investigation Engine (spec §2, component 1): wires the intent
//! analyzer, decision tree, and agent coordinator together into the
//! evidence-gathering path for `investigate`/read-only utterances.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use crate::agents::coordinator::{AgentCoordinator, Metadata};
use crate::agents::types::{AgentContext, AgentOperation, AgentType};
use crate::capability::CapabilityRegistry;
use crate::decision::{DecisionNode, DecisionTree, Predicate};
use crate::error::Result;
use crate::intent::{Intent, analyze_query};

/// Builds the default decision tree (spec §4.2): a root that always
/// matches, with one child per investigation concern. Built once; callers
/// should cache the result rather than rebuilding it per request.
pub fn default_decision_tree() -> DecisionTree {
    DecisionTree::new(vec![
        DecisionNode::new("root", "root", Predicate::Always).with_children(vec![
            DecisionNode::new(
                "logs",
                "investigate-logs",
                Predicate::contains_keywords(["error", "errors", "failing", "failure", "crash", "500ing"]),
            )
            .with_agent_types(["log_investigator"])
            .with_priority(8),
            DecisionNode::new(
                "metrics",
                "investigate-metrics",
                Predicate::contains_keywords(["metric", "metrics", "cpu", "memory", "latency", "slow"]),
            )
            .with_agent_types(["metrics_investigator"])
            .with_priority(6),
            DecisionNode::new(
                "status",
                "check-status",
                Predicate::contains_keywords(["status", "health", "up", "down", "running"]),
            )
            .with_agent_types(["status_investigator"])
            .with_priority(5),
            DecisionNode::new(
                "discovery",
                "discover-services",
                Predicate::Always,
            )
            .with_agent_types(["service_discovery"])
            .with_priority(1),
        ]),
    ])
}

/// Resolves an applicable decision-node's agent type names into concrete
/// [`AgentType`]s with their capability operation vectors. Deduplicates by
/// name, keeping the highest-priority entry (spec §4.3).
fn resolve_agent_types(applicable_names_by_priority: Vec<(String, i32)>) -> Vec<AgentType> {
    let mut best: IndexMap<String, i32> = IndexMap::new();
    for (name, priority) in applicable_names_by_priority {
        let entry = best.entry(name).or_insert(priority);
        if priority > *entry {
            *entry = priority;
        }
    }

    best.into_keys().map(|name| build_agent_type(&name)).collect()
}

fn build_agent_type(name: &str) -> AgentType {
    match name {
        "log_investigator" => AgentType::new("log_investigator", 0)
            .provides(["logs"])
            .with_operations(vec![
                AgentOperation::new("get_recent_logs"),
                AgentOperation::new("investigate_service_logs").best_effort(),
            ]),
        "metrics_investigator" => AgentType::new("metrics_investigator", 0)
            .provides(["metrics"])
            .with_operations(vec![AgentOperation::new("describe_instances")]),
        "status_investigator" => AgentType::new("status_investigator", 1)
            .requires(["logs"])
            .provides(["status"])
            .with_operations(vec![AgentOperation::new("caller_identity")]),
        "service_discovery" => AgentType::new("service_discovery", 0)
            .provides(["services"])
            .with_operations(vec![AgentOperation::new("discover_services").best_effort()]),
        other => AgentType::new(other, 0),
    }
}

pub struct InvestigationResult {
    pub intent: Intent,
    pub decision_path: Vec<String>,
    pub results: IndexMap<String, Value>,
    pub metadata: Metadata,
}

/// Runs one full investigation: classify, traverse the decision tree,
/// resolve/dedupe agent types, schedule and run the coordinator, and return
/// the aggregated evidence.
pub async fn investigate(
    query: &str,
    tree: &DecisionTree,
    registry: Arc<CapabilityRegistry>,
    provider: &str,
    deadline: Duration,
) -> Result<InvestigationResult> {
    let intent = analyze_query(query);
    let matched = tree.applicable(query);

    let decision_path = matched.last().map(|m| m.path.clone()).unwrap_or_default();
    let agent_entries: Vec<(String, i32)> = matched
        .iter()
        .flat_map(|m| m.node.agent_types.iter().map(|name| (name.clone(), m.node.priority)))
        .collect();
    let agent_types = resolve_agent_types(agent_entries);

    let coordinator = AgentCoordinator::new(registry, provider.to_string());
    let context = AgentContext::new(query, 25, chrono::Utc::now());
    let aggregated = coordinator.run(agent_types, &context, decision_path.clone(), deadline).await?;

    Ok(InvestigationResult {
        intent,
        decision_path,
        results: aggregated.results,
        metadata: aggregated.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::runner::{CommandOutput, MockCommandRunner};

    #[tokio::test]
    async fn investigation_aggregates_settled_metadata() {
        let runner: Arc<dyn crate::capability::runner::CommandRunner> =
            Arc::new(MockCommandRunner::new(vec![
                CommandOutput { stdout: "{}".into(), stderr: String::new(), status: Some(0) },
                CommandOutput { stdout: "{}".into(), stderr: String::new(), status: Some(0) },
            ]));
        let registry = Arc::new(CapabilityRegistry::new(runner));
        let tree = default_decision_tree();

        let result = investigate(
            "urgent: api gateway errors after deploy",
            &tree,
            registry,
            "aws",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(result.intent.primary, "troubleshoot");
        assert_eq!(result.metadata.total, result.metadata.completed + result.metadata.failed);
        assert!(!result.decision_path.is_empty());
    }

    #[test]
    fn resolve_agent_types_dedupes_keeping_highest_priority() {
        let types = resolve_agent_types(vec![
            ("log_investigator".to_string(), 3),
            ("log_investigator".to_string(), 8),
        ]);
        assert_eq!(types.len(), 1);
    }
}
