use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::Result;

use super::runner::{CommandOutput, CommandRunner};
use super::{CapabilityBackend, OperationSpec};

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "list_functions",
        binary: "gcloud",
        args: &["functions", "list", "--format=json"],
        best_effort: false,
    },
    OperationSpec {
        name: "get_recent_logs",
        binary: "gcloud",
        args: &["logging", "read", "{filter}", "--limit", "{limit}", "--format=json"],
        best_effort: false,
    },
    OperationSpec {
        name: "list_services",
        binary: "gcloud",
        args: &["run", "services", "list", "--format=json"],
        best_effort: false,
    },
    OperationSpec {
        name: "discover_services",
        binary: "gcloud",
        args: &["asset", "search-all-resources", "--format=json"],
        best_effort: true,
    },
    OperationSpec {
        name: "investigate_service_logs",
        binary: "gcloud",
        args: &["logging", "read", "{filter}", "--format=json"],
        best_effort: true,
    },
];

pub struct GcpBackend {
    runner: Arc<dyn CommandRunner>,
}

impl GcpBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapabilityBackend for GcpBackend {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec> {
        OPERATIONS.iter().find(|op| op.name == name)
    }

    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(args).await
    }
}
