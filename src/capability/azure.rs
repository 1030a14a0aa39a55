use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::Result;

use super::runner::{CommandOutput, CommandRunner};
use super::{CapabilityBackend, OperationSpec};

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "list_functions",
        binary: "az",
        args: &["functionapp", "list", "--output", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "get_recent_logs",
        binary: "az",
        args: &["monitor", "activity-log", "list", "--output", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "list_container_apps",
        binary: "az",
        args: &["containerapp", "list", "--output", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "discover_services",
        binary: "az",
        args: &["resource", "list", "--output", "json"],
        best_effort: true,
    },
    OperationSpec {
        name: "investigate_service_logs",
        binary: "az",
        args: &["webapp", "log", "tail", "--name", "{name}"],
        best_effort: true,
    },
];

pub struct AzureBackend {
    runner: Arc<dyn CommandRunner>,
}

impl AzureBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapabilityBackend for AzureBackend {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec> {
        OPERATIONS.iter().find(|op| op.name == name)
    }

    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(args).await
    }
}
