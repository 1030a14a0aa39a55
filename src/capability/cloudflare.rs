use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::Result;

use super::runner::{CommandOutput, CommandRunner};
use super::{CapabilityBackend, OperationSpec};

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "tail_logs",
        binary: "wrangler",
        args: &["tail", "{worker}", "--format", "json"],
        best_effort: false,
    },
    OperationSpec {
        name: "list_workers",
        binary: "wrangler",
        args: &["deployments", "list"],
        best_effort: false,
    },
    OperationSpec {
        name: "discover_services",
        binary: "wrangler",
        args: &["deployments", "list"],
        best_effort: true,
    },
    OperationSpec {
        name: "investigate_service_logs",
        binary: "wrangler",
        args: &["tail", "{worker}"],
        best_effort: true,
    },
];

pub struct CloudflareBackend {
    runner: Arc<dyn CommandRunner>,
}

impl CloudflareBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapabilityBackend for CloudflareBackend {
    fn provider(&self) -> Provider {
        Provider::Cloudflare
    }

    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec> {
        OPERATIONS.iter().find(|op| op.name == name)
    }

    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(args).await
    }
}
