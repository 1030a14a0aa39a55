use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ClankerError, Result};

/// Output of one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Seam between the capability registry and an actual OS process, mirroring
/// the teacher's `IaCCommandRunner` abstraction over `std::process::Command`
/// (`src/iac.rs`), generalized from "run terraform" to "run any provider
/// CLI".
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands for real via `tokio::process::Command`.
pub struct DefaultCommandRunner;

#[async_trait]
impl CommandRunner for DefaultCommandRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        let Some((program, rest)) = args.split_first() else {
            return Err(ClankerError::Capability {
                operation: "exec_cli".into(),
                message: "empty command".into(),
            });
        };

        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}

/// Records every invocation and replays canned outputs in call order,
/// mirroring the teacher's `iac.rs::MockRunner` (`Arc<Mutex<Vec<...>>>`
/// around the calls it observed).
#[derive(Default)]
pub struct MockCommandRunner {
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
    responses: Arc<Mutex<Vec<CommandOutput>>>,
}

impl MockCommandRunner {
    pub fn new(responses: Vec<CommandOutput>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().expect("mock runner lock poisoned").push(args.to_vec());
        let mut responses = self.responses.lock().expect("mock runner lock poisoned");
        if responses.is_empty() {
            Ok(CommandOutput { stdout: String::new(), stderr: String::new(), status: Some(0) })
        } else {
            Ok(responses.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_runner_records_calls_and_replays_responses() {
        let runner = MockCommandRunner::new(vec![CommandOutput {
            stdout: "{\"ok\":true}".into(),
            stderr: String::new(),
            status: Some(0),
        }]);
        let out = runner.run(&["aws".into(), "sts".into(), "get-caller-identity".into()]).await.unwrap();
        assert!(out.success());
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }
}
