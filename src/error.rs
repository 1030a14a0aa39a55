use std::io;

use thiserror::Error;

/// Classification of a failure, used by callers that need to react
/// differently to a best-effort miss vs. an exhausted retry budget.
///
/// See spec §7: `NotApplicable` operations are swallowed by their agent,
/// `Invalid` surfaces a truncated offending snippet, `Retryable` failures are
/// retried inside a local bound (pages, repair rounds), `Fatal` aborts the
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotApplicable,
    Invalid,
    Retryable,
    Fatal,
}

#[derive(Debug, Error)]
pub enum ClankerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("capability '{operation}' failed: {message}")]
    Capability { operation: String, message: String },

    #[error("capability binary '{binary}' missing on PATH for provider {provider}")]
    CapabilityMissing { provider: String, binary: &'static str },

    #[error("plan parse/shape error: {0}")]
    InvalidPlan(String),

    #[error("unresolved binding '{name}' in command {command_index}")]
    UnresolvedBinding { name: String, command_index: usize },

    #[error("command {command_index} failed (exit {status:?}): {stderr}")]
    ExecutionFailed {
        command_index: usize,
        status: Option<i32>,
        stderr: String,
    },

    #[error("deadline of {minutes} minute(s) exceeded during {phase}")]
    DeadlineExceeded { phase: &'static str, minutes: u64 },

    #[error("timeout waiting for agents")]
    AgentTimeout,

    #[error("failed to generate a plan: {0}")]
    PlanningFailed(String),

    #[error("unexpected error: {0}")]
    Other(String),
}

impl ClankerError {
    /// The severity bucket this error falls into, per spec §7's error-kind
    /// taxonomy. Most variants map to a fixed kind; `Capability` carries its
    /// own because the same variant is reused for both best-effort and
    /// mandatory operations.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClankerError::Config(_) => ErrorKind::Fatal,
            ClankerError::Io(_) => ErrorKind::Retryable,
            ClankerError::Json(_) => ErrorKind::Invalid,
            ClankerError::Llm(_) => ErrorKind::Retryable,
            ClankerError::Capability { .. } => ErrorKind::NotApplicable,
            ClankerError::CapabilityMissing { .. } => ErrorKind::Fatal,
            ClankerError::InvalidPlan(_) => ErrorKind::Invalid,
            ClankerError::UnresolvedBinding { .. } => ErrorKind::Fatal,
            ClankerError::ExecutionFailed { .. } => ErrorKind::Fatal,
            ClankerError::DeadlineExceeded { .. } => ErrorKind::Fatal,
            ClankerError::AgentTimeout => ErrorKind::Retryable,
            ClankerError::PlanningFailed(_) => ErrorKind::Fatal,
            ClankerError::Other(_) => ErrorKind::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClankerError>;
