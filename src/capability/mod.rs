//! Capability Registry (spec §4's "leaf" component, §6 external interface).
//! Maps named operations (e.g. `get_recent_logs`) to provider-CLI argument
//! vectors, and exposes raw CLI passthrough. Concrete per-provider API
//! clients are out of scope (spec §1); this module is the thin collaborator
//! seam standing in for them, built the way the teacher's
//! `providers/{aws,gcp,azure}.rs` implement `ProviderBackend` against a CLI.

pub mod aws;
pub mod azure;
pub mod cloudflare;
pub mod gcp;
pub mod k8s;
pub mod runner;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::config::Provider;
use crate::error::{ClankerError, Result};
use runner::CommandRunner;

/// A single entry in a provider's operation table: the argv template (with
/// `{param}` placeholders substituted from the call's params map) and
/// whether a failure should be swallowed by the calling agent.
pub struct OperationSpec {
    pub name: &'static str,
    pub binary: &'static str,
    pub args: &'static [&'static str],
    pub best_effort: bool,
}

/// Substitutes `{param}` placeholders in an operation's argv template from
/// the call's params map. Unknown placeholders are left as literal text so
/// malformed templates fail loudly downstream instead of silently dropping
/// arguments.
pub fn render_args(spec: &OperationSpec, params: &IndexMap<String, Value>) -> Vec<String> {
    let mut out = Vec::with_capacity(spec.args.len() + 1);
    out.push(spec.binary.to_string());
    for template in spec.args {
        if let Some(key) = template.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let value = params
                .get(key)
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| template.to_string());
            out.push(value);
        } else {
            out.push(template.to_string());
        }
    }
    out
}

/// `ExecuteOperation(name, params)` + raw `ExecCLI` (spec §6). Implementors
/// own one provider's operation table and command runner.
#[async_trait]
pub trait CapabilityBackend: Send + Sync {
    fn provider(&self) -> Provider;
    fn find_operation(&self, name: &str) -> Option<&'static OperationSpec>;
    async fn exec(&self, args: &[String]) -> Result<runner::CommandOutput>;

    async fn execute_operation(&self, name: &str, params: &IndexMap<String, Value>) -> Result<Value> {
        let spec = self.find_operation(name).ok_or_else(|| ClankerError::Capability {
            operation: name.to_string(),
            message: format!("no such operation for provider {}", self.provider().as_str()),
        })?;
        let argv = render_args(spec, params);
        let output = self.exec(&argv).await?;
        if !output.success() && !spec.best_effort {
            return Err(ClankerError::Capability {
                operation: name.to_string(),
                message: output.stderr,
            });
        }
        serde_json::from_str(&output.stdout)
            .or_else(|_| Ok(Value::String(output.stdout)))
    }
}

/// Aggregates one `CapabilityBackend` per provider and exposes the
/// `ExecuteOperation`/`ExecCLI` surface the coordinator and executor call
/// against, without either caring which provider is behind a given call.
pub struct CapabilityRegistry {
    backends: IndexMap<&'static str, Arc<dyn CapabilityBackend>>,
}

impl CapabilityRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let mut backends: IndexMap<&'static str, Arc<dyn CapabilityBackend>> = IndexMap::new();
        backends.insert("aws", Arc::new(aws::AwsBackend::new(runner.clone())));
        backends.insert("gcp", Arc::new(gcp::GcpBackend::new(runner.clone())));
        backends.insert("azure", Arc::new(azure::AzureBackend::new(runner.clone())));
        backends.insert("cloudflare", Arc::new(cloudflare::CloudflareBackend::new(runner.clone())));
        backends.insert("k8s", Arc::new(k8s::K8sBackend::new(runner)));
        Self { backends }
    }

    pub fn backend(&self, provider: &str) -> Result<&Arc<dyn CapabilityBackend>> {
        self.backends
            .get(provider)
            .ok_or_else(|| ClankerError::Capability {
                operation: "lookup".into(),
                message: format!("unknown provider '{provider}'"),
            })
    }

    pub async fn execute_operation(
        &self,
        provider: &str,
        name: &str,
        params: &IndexMap<String, Value>,
    ) -> Result<Value> {
        self.backend(provider)?.execute_operation(name, params).await
    }

    /// Raw CLI passthrough for ad-hoc provider commands (spec §6).
    pub async fn exec_cli(&self, provider: &str, args: &[String]) -> Result<runner::CommandOutput> {
        self.backend(provider)?.exec(args).await
    }
}
