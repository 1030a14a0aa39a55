//! Plan Executor (spec §4.10). Runs commands strictly in order, threading
//! earlier commands' `produces` outputs into later commands' `<NAME>`
//! placeholders, with an optional local Docker build+push phase split and a
//! post-deploy health poll.

mod jsonpath;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::capability::CapabilityRegistry;
use crate::error::{ClankerError, Result};
use crate::planner::plan::{Command, Plan};

const HEALTH_POLL_TIMEOUT: Duration = Duration::from_secs(6 * 60);
const HEALTH_POLL_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const HEALTH_POLL_MAX_BACKOFF: Duration = Duration::from_secs(15);
const DEFAULT_HEALTH_PATH: &str = "/health";

/// One command's execution outcome, surfaced to the caller for reporting.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub index: usize,
    pub args: Vec<String>,
    pub stdout: String,
    pub succeeded: bool,
}

/// Final result of an apply run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    pub outcomes: Vec<CommandOutcome>,
    pub bindings: IndexMap<String, String>,
    pub resolved_endpoint: Option<String>,
    pub health_check_passed: Option<bool>,
}

/// Substitutes every `<NAME>` in `arg` from `bindings`. Fails fast if a
/// token is unbound and not produced by the *current* command's `produces`
/// map (those resolve after the command runs, not before).
fn substitute_args(
    command: &Command,
    index: usize,
    bindings: &IndexMap<String, String>,
) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(command.args.len());
    for arg in &command.args {
        let mut resolved = arg.clone();
        for token in super_angle_tokens(arg) {
            if let Some(value) = bindings.get(&token) {
                resolved = resolved.replace(&format!("<{token}>"), value);
            } else if command.produces.contains_key(&token) {
                // Produced by this very command; substituted after it runs.
                continue;
            } else {
                return Err(ClankerError::UnresolvedBinding { name: token, command_index: index + 1 });
            }
        }
        out.push(resolved);
    }
    Ok(out)
}

fn super_angle_tokens(arg: &str) -> Vec<String> {
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

/// Base64-encodes EC2 `--user-data`/`--user-data-file` inline script
/// arguments so shell heredocs inside them are never misparsed as
/// placeholder tokens by a later command (spec §4.10). Recognizes a script
/// by its `#!` or `#cloud-config` prefix, mirroring the resolver's check.
fn encode_inline_user_data(args: &mut [String]) {
    for i in 0..args.len() {
        let is_user_data_flag = args[i] == "--user-data";
        if is_user_data_flag
            && let Some(value) = args.get(i + 1).cloned()
            && (value.starts_with("#!") || value.starts_with("#cloud-config"))
        {
            args[i + 1] = BASE64.encode(value.as_bytes());
        }
    }
}

fn find_phase_split(plan: &Plan) -> Option<usize> {
    plan.commands.iter().position(|c| c.verb_subcommand() == Some(("ec2", "run-instances")))
}

pub struct PlanExecutor {
    registry: Arc<CapabilityRegistry>,
    http_client: reqwest::Client,
}

impl PlanExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry, http_client: reqwest::Client::new() }
    }

    /// Runs `plan` to completion against `bindings` (seeded with static
    /// infra facts and user config by the caller). Aborts on the first
    /// non-best-effort error unless the failing command declares an
    /// `on_error` hint of `"continue"`.
    pub async fn execute(
        &self,
        plan: &Plan,
        mut bindings: IndexMap<String, String>,
        repo_has_dockerfile: bool,
    ) -> Result<ExecutionSummary> {
        let mut outcomes = Vec::new();
        let split = find_phase_split(plan);

        let phase1_end = split.unwrap_or(plan.commands.len());
        self.run_range(plan, 0, phase1_end, &mut bindings, &mut outcomes).await?;

        if split.is_some() {
            self.maybe_build_and_push(&mut bindings, repo_has_dockerfile).await?;
            self.run_range(plan, phase1_end, plan.commands.len(), &mut bindings, &mut outcomes).await?;
        }

        let resolved_endpoint = derive_endpoint(&bindings);
        let health_check_passed = if let Some(endpoint) = &resolved_endpoint {
            Some(self.verify_health(endpoint, &bindings).await)
        } else {
            None
        };

        Ok(ExecutionSummary { outcomes, bindings, resolved_endpoint, health_check_passed })
    }

    async fn run_range(
        &self,
        plan: &Plan,
        start: usize,
        end: usize,
        bindings: &mut IndexMap<String, String>,
        outcomes: &mut Vec<CommandOutcome>,
    ) -> Result<()> {
        for index in start..end {
            let command = &plan.commands[index];
            let mut args = substitute_args(command, index, bindings)?;
            encode_inline_user_data(&mut args);

            info!(index = index + 1, args = ?truncated_args(&args), "executing command");

            let Some(provider) = args.first().cloned() else {
                return Err(ClankerError::InvalidPlan(format!("command {} has no provider/binary arg", index + 1)));
            };

            let result = self.registry.exec_cli(&provider, &args).await;
            match result {
                Ok(output) if output.success() => {
                    for (key, path) in &command.produces {
                        if let Some(value) = jsonpath::extract(&output.stdout, path) {
                            bindings.insert(key.clone(), value);
                        }
                    }
                    outcomes.push(CommandOutcome {
                        index: index + 1,
                        args: args.clone(),
                        stdout: output.stdout,
                        succeeded: true,
                    });
                }
                Ok(output) => {
                    outcomes.push(CommandOutcome {
                        index: index + 1,
                        args: args.clone(),
                        stdout: output.stdout.clone(),
                        succeeded: false,
                    });
                    if command.on_error.as_deref() == Some("continue") {
                        warn!(index = index + 1, stderr = %output.stderr, "command failed, continuing per on_error hint");
                        continue;
                    }
                    return Err(ClankerError::ExecutionFailed {
                        command_index: index + 1,
                        status: None,
                        stderr: truncate(&output.stderr),
                    });
                }
                Err(err) => {
                    if command.on_error.as_deref() == Some("continue") {
                        warn!(index = index + 1, error = %err, "command errored, continuing per on_error hint");
                        continue;
                    }
                    return Err(ClankerError::ExecutionFailed {
                        command_index: index + 1,
                        status: None,
                        stderr: truncate(&err.to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Between phases, if `ECR_URI` is bound and the repo has a Dockerfile,
    /// runs a local `docker build` + `docker push` and binds `IMAGE_URI`.
    async fn maybe_build_and_push(
        &self,
        bindings: &mut IndexMap<String, String>,
        repo_has_dockerfile: bool,
    ) -> Result<()> {
        let Some(ecr_uri) = bindings.get("ECR_URI").cloned() else { return Ok(()) };
        if !repo_has_dockerfile {
            return Ok(());
        }

        let build = tokio::process::Command::new("docker")
            .args(["build", "-t", &ecr_uri, "."])
            .output()
            .await?;
        if !build.status.success() {
            return Err(ClankerError::ExecutionFailed {
                command_index: 0,
                status: build.status.code(),
                stderr: truncate(&String::from_utf8_lossy(&build.stderr)),
            });
        }

        let push = tokio::process::Command::new("docker")
            .args(["push", &ecr_uri])
            .output()
            .await?;
        if !push.status.success() {
            return Err(ClankerError::ExecutionFailed {
                command_index: 0,
                status: push.status.code(),
                stderr: truncate(&String::from_utf8_lossy(&push.stderr)),
            });
        }

        bindings.insert("IMAGE_URI".to_string(), ecr_uri);
        Ok(())
    }

    /// Polls the derived endpoint's health path with exponential backoff,
    /// falling back to `/` if the configured health path never returns 200
    /// OK — both probe attempts share a single [`HEALTH_POLL_TIMEOUT`]
    /// budget (spec S6: "until 200 OK or 6-minute timeout"), not one each.
    async fn verify_health(&self, endpoint: &str, bindings: &IndexMap<String, String>) -> bool {
        let configured_path = bindings.get("HEALTH_ENDPOINT").cloned().unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_string());
        let deadline = tokio::time::Instant::now() + HEALTH_POLL_TIMEOUT;
        for path in [configured_path, "/".to_string()] {
            if self.poll_until_ok(endpoint, &path, deadline).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
        false
    }

    async fn poll_until_ok(&self, endpoint: &str, path: &str, deadline: tokio::time::Instant) -> bool {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
        let mut backoff = HEALTH_POLL_INITIAL_BACKOFF;

        while tokio::time::Instant::now() < deadline {
            if let Ok(response) = self.http_client.get(&url).send().await
                && response.status().is_success()
            {
                return true;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(HEALTH_POLL_MAX_BACKOFF);
        }
        false
    }
}

/// Derives the deployment's resolved endpoint from whichever binding is
/// present, preferring an HTTPS URL over a CloudFront domain over a raw
/// ALB DNS name (spec §7, apply mode "resolved endpoint" field).
fn derive_endpoint(bindings: &IndexMap<String, String>) -> Option<String> {
    if let Some(url) = bindings.get("HTTPS_URL") {
        return Some(url.clone());
    }
    if let Some(domain) = bindings.get("CLOUDFRONT_DOMAIN") {
        return Some(format!("https://{domain}"));
    }
    if let Some(dns) = bindings.get("ALB_DNS") {
        return Some(format!("http://{dns}"));
    }
    bindings.get("INSTANCE_PUBLIC_IP").map(|ip| format!("http://{ip}"))
}

fn truncate(text: &str) -> String {
    const MAX: usize = 2000;
    if text.len() > MAX { format!("{}... (truncated)", &text[..MAX]) } else { text.to_string() }
}

fn truncated_args(args: &[String]) -> Vec<String> {
    args.iter().map(|a| if a.len() > 120 { format!("{}...", &a[..120]) } else { a.clone() }).collect()
}
