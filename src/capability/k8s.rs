use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::Result;

use super::runner::{CommandOutput, CommandRunner};
use super::{CapabilityBackend, OperationSpec};

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "k8s_get_cluster_resources",
        binary: "kubectl",
        args: &["get", "all", "-A", "-o", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "get_recent_logs",
        binary: "kubectl",
        args: &["logs", "{pod}", "--since", "{since}"],
        best_effort: false,
    },
    OperationSpec {
        name: "get_pods",
        binary: "kubectl",
        args: &["get", "pods", "-n", "{namespace}", "-o", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "discover_services",
        binary: "kubectl",
        args: &["get", "svc", "-A", "-o", "json"],
        best_effort: true,
    },
    OperationSpec {
        name: "investigate_service_logs",
        binary: "kubectl",
        args: &["logs", "{pod}"],
        best_effort: true,
    },
];

pub struct K8sBackend {
    runner: Arc<dyn CommandRunner>,
}

impl K8sBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapabilityBackend for K8sBackend {
    fn provider(&self) -> Provider {
        Provider::K8s
    }

    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec> {
        OPERATIONS.iter().find(|op| op.name == name)
    }

    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::render_args;
    use indexmap::IndexMap;
    use serde_json::Value;

    #[test]
    fn renders_namespace_placeholder() {
        let spec = OPERATIONS.iter().find(|op| op.name == "get_pods").unwrap();
        let mut params = IndexMap::new();
        params.insert("namespace".to_string(), Value::String("prod".into()));
        let args = render_args(spec, &params);
        assert_eq!(args, vec!["kubectl", "get", "pods", "-n", "prod", "-o", "json"]);
    }
}
