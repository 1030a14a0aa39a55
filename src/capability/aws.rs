use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::Result;

use super::runner::{CommandOutput, CommandRunner};
use super::{CapabilityBackend, OperationSpec};

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "list_lambda_functions",
        binary: "aws",
        args: &["lambda", "list-functions"],
        best_effort: false,
    },
    OperationSpec {
        name: "get_recent_logs",
        binary: "aws",
        args: &["logs", "tail", "{log_group}", "--since", "{since}"],
        best_effort: false,
    },
    OperationSpec {
        name: "describe_log_groups",
        binary: "aws",
        args: &["logs", "describe-log-groups", "--log-group-name-prefix", "{prefix}"],
        best_effort: false,
    },
    OperationSpec {
        name: "list_log_groups",
        binary: "aws",
        args: &["logs", "describe-log-groups"],
        best_effort: false,
    },
    OperationSpec {
        name: "describe_instances",
        binary: "aws",
        args: &["ec2", "describe-instances"],
        best_effort: false,
    },
    OperationSpec {
        name: "caller_identity",
        binary: "aws",
        args: &["sts", "get-caller-identity"],
        best_effort: false,
    },
    OperationSpec {
        name: "describe_default_vpc",
        binary: "aws",
        args: &["ec2", "describe-vpcs", "--filters", "Name=is-default,Values=true"],
        best_effort: false,
    },
    OperationSpec {
        name: "describe_subnets",
        binary: "aws",
        args: &["ec2", "describe-subnets"],
        best_effort: false,
    },
    OperationSpec {
        name: "describe_hardened_amis",
        binary: "aws",
        args: &["ec2", "describe-images", "--owners", "amazon", "--filters", "Name=name,Values={name_pattern}"],
        best_effort: false,
    },
    OperationSpec {
        name: "discover_services",
        binary: "aws",
        args: &["resourcegroupstaggingapi", "get-resources"],
        best_effort: true,
    },
    OperationSpec {
        name: "investigate_service_logs",
        binary: "aws",
        args: &["logs", "tail", "{log_group}"],
        best_effort: true,
    },
];

pub struct AwsBackend {
    runner: Arc<dyn CommandRunner>,
}

impl AwsBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CapabilityBackend for AwsBackend {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec> {
        OPERATIONS.iter().find(|op| op.name == name)
    }

    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(args).await
    }
}
