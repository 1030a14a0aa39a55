use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::capability::CapabilityRegistry;
use crate::error::Result;

use super::bus::SharedDataBus;
use super::registry::AgentRegistry;
use super::scheduler::{group_into_layers, is_ready};
use super::types::{AgentContext, AgentResult, AgentType};

/// Aggregate of all agents' results, keyed by agent name and by
/// `<agent>_<operation>`, plus a `_metadata` entry (spec §4.3).
pub struct AggregatedResult {
    pub results: IndexMap<String, Value>,
    pub metadata: Metadata,
}

pub struct Metadata {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub decision_path: Vec<String>,
}

/// Spawns one worker per ready agent per execution-order layer, waits for
/// each layer to finish before starting the next, and aggregates results
/// (spec §4.3, concurrency model §5).
pub struct AgentCoordinator {
    registry: Arc<CapabilityRegistry>,
    provider: String,
}

impl AgentCoordinator {
    pub fn new(registry: Arc<CapabilityRegistry>, provider: impl Into<String>) -> Self {
        Self { registry, provider: provider.into() }
    }

    pub async fn run(
        &self,
        agent_types: Vec<AgentType>,
        context: &AgentContext,
        decision_path: Vec<String>,
        deadline: Duration,
    ) -> Result<AggregatedResult> {
        let bus = SharedDataBus::new();
        let agent_registry = AgentRegistry::new();
        let mut collected: IndexMap<String, AgentResult> = IndexMap::new();

        let layers = group_into_layers(agent_types);
        for layer in layers {
            let mut join_set: JoinSet<AgentResult> = JoinSet::new();
            let mut outstanding = 0usize;

            for agent in layer {
                if !is_ready(&agent, &bus) {
                    agent_registry.register(agent.name.clone());
                    agent_registry.mark_failed();
                    collected.insert(
                        agent.name.clone(),
                        AgentResult {
                            agent_name: agent.name.clone(),
                            results: IndexMap::new(),
                            error: Some("required data unavailable on shared bus".to_string()),
                        },
                    );
                    continue;
                }

                agent_registry.register(agent.name.clone());
                let worker_context = context.fork();
                let registry = self.registry.clone();
                let provider = self.provider.clone();

                join_set.spawn(async move {
                    run_agent(agent, worker_context, registry, provider).await
                });
                outstanding += 1;
            }

            let layer_deadline = tokio::time::sleep(deadline);
            tokio::pin!(layer_deadline);

            loop {
                tokio::select! {
                    next = join_set.join_next() => {
                        match next {
                            Some(Ok(result)) => {
                                outstanding -= 1;
                                if result.succeeded() {
                                    agent_registry.mark_completed();
                                    publish(&bus, &result);
                                } else {
                                    agent_registry.mark_failed();
                                }
                                collected.insert(result.agent_name.clone(), result);
                            }
                            Some(Err(_join_err)) => {
                                outstanding -= 1;
                                agent_registry.mark_failed();
                            }
                            None => break,
                        }
                    }
                    _ = &mut layer_deadline => {
                        join_set.abort_all();
                        while join_set.join_next().await.is_some() {}
                        // Every agent still outstanding at the deadline was
                        // registered (counted into `total`) but never
                        // produced a result, so it must still be tallied
                        // into `failed` to keep `total == completed + failed`.
                        for _ in 0..outstanding {
                            agent_registry.mark_failed();
                        }
                        break;
                    }
                }
            }
        }

        let mut results = IndexMap::new();
        for (agent_name, agent_result) in &collected {
            results.insert(agent_name.clone(), Value::Object(agent_result.results.clone().into_iter().collect()));
            for (op_name, op_result) in &agent_result.results {
                results.insert(format!("{agent_name}_{op_name}"), op_result.clone());
            }
        }

        Ok(AggregatedResult {
            results,
            metadata: Metadata {
                total: agent_registry.total(),
                completed: agent_registry.completed(),
                failed: agent_registry.failed(),
                decision_path,
            },
        })
    }
}

fn publish(bus: &SharedDataBus, result: &AgentResult) {
    let aggregate = Value::Object(result.results.clone().into_iter().collect());
    bus.publish(result.agent_name.clone(), aggregate);
}

/// Runs one agent's operation vector against the capability registry.
/// Fails the agent on the first non-best-effort operation error; best-effort
/// operations (spec's `discover_services`/`investigate_service_logs`, or
/// whichever the capability table marks) swallow their own failures so the
/// agent still completes with partial results.
async fn run_agent(
    agent: AgentType,
    _context: AgentContext,
    registry: Arc<CapabilityRegistry>,
    provider: String,
) -> AgentResult {
    let mut results = IndexMap::new();

    for operation in &agent.operations {
        match registry.execute_operation(&provider, &operation.name, &operation.params).await {
            Ok(value) => {
                results.insert(operation.name.clone(), value);
            }
            Err(err) => {
                if operation.best_effort {
                    results.insert(
                        operation.name.clone(),
                        Value::String(format!("best-effort operation failed: {err}")),
                    );
                    continue;
                }
                return AgentResult {
                    agent_name: agent.name.clone(),
                    results,
                    error: Some(err.to_string()),
                };
            }
        }
    }

    AgentResult { agent_name: agent.name, results, error: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::AgentOperation;
    use crate::capability::runner::{CommandOutput, MockCommandRunner};

    fn context() -> AgentContext {
        AgentContext::new("test query", 10, Utc::now())
    }

    #[tokio::test]
    async fn aggregation_reports_settled_metadata() {
        let runner: Arc<dyn crate::capability::runner::CommandRunner> =
            Arc::new(MockCommandRunner::new(vec![CommandOutput {
                stdout: "{}".into(),
                stderr: String::new(),
                status: Some(0),
            }]));
        let registry = Arc::new(CapabilityRegistry::new(runner));
        let coordinator = AgentCoordinator::new(registry, "aws");

        let agent = AgentType::new("discovery", 0)
            .with_operations(vec![AgentOperation::new("discover_services")]);

        let aggregated = coordinator
            .run(vec![agent], &context(), vec!["root".into()], Duration::from_secs(5))
            .await
            .expect("coordinator run succeeds");

        assert_eq!(aggregated.metadata.total, aggregated.metadata.completed + aggregated.metadata.failed);
        assert_eq!(aggregated.metadata.completed, 1);
    }

    struct SlowRunner;

    #[async_trait::async_trait]
    impl crate::capability::runner::CommandRunner for SlowRunner {
        async fn run(&self, _args: &[String]) -> Result<CommandOutput> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(CommandOutput { stdout: "{}".into(), stderr: String::new(), status: Some(0) })
        }
    }

    #[tokio::test]
    async fn layer_timeout_still_settles_metadata() {
        let registry = Arc::new(CapabilityRegistry::new(Arc::new(SlowRunner)));
        let coordinator = AgentCoordinator::new(registry, "aws");

        let agent = AgentType::new("discovery", 0)
            .with_operations(vec![AgentOperation::new("discover_services")]);

        let aggregated = coordinator
            .run(vec![agent], &context(), vec!["root".into()], Duration::from_millis(10))
            .await
            .expect("coordinator run succeeds");

        assert_eq!(aggregated.metadata.total, aggregated.metadata.completed + aggregated.metadata.failed);
        assert_eq!(aggregated.metadata.failed, 1);
    }

    #[tokio::test]
    async fn agent_missing_required_data_never_starts() {
        let runner: Arc<dyn crate::capability::runner::CommandRunner> =
            Arc::new(MockCommandRunner::new(vec![]));
        let registry = Arc::new(CapabilityRegistry::new(runner));
        let coordinator = AgentCoordinator::new(registry, "aws");

        let blocked = AgentType::new("needs-upstream", 0).requires(["missing_key"]);

        let aggregated = coordinator
            .run(vec![blocked], &context(), vec![], Duration::from_secs(5))
            .await
            .expect("coordinator run succeeds");

        assert_eq!(aggregated.metadata.failed, 1);
        assert_eq!(aggregated.metadata.completed, 0);
    }
}
