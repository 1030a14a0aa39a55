use std::env;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{ClankerError, Result};

/// Whether a request is allowed to mutate infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Produce (and optionally print) a plan only; never execute commands.
    PlanOnly,
    /// Produce a plan, validate/repair/resolve it, and execute it.
    Apply,
}

/// Supported cloud/platform targets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    Cloudflare,
    K8s,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
            Provider::Cloudflare => "cloudflare",
            Provider::K8s => "k8s",
        }
    }
}

/// Output format for plans and investigation results.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Top-level CLI structure. Flag plumbing is kept intentionally thin: its
/// only job is getting an utterance and a handful of mode switches to the
/// conversational router.
#[derive(Debug, Parser)]
#[command(
    name = "clanker",
    version,
    about = "Ask about, or act on, your cloud infrastructure in plain English."
)]
pub struct CliArgs {
    /// The natural-language request, e.g. "why is checkout-api 500ing".
    pub utterance: String,

    /// Restrict evidence-gathering/planning to this provider; otherwise
    /// inferred from the utterance and repository context.
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Execute the resulting plan instead of only printing it.
    #[arg(long, default_value_t = false)]
    pub apply: bool,

    /// Output format for plans/investigation summaries.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Per-request deadline in minutes (investigation, planning, and
    /// execution together share this budget).
    #[arg(long)]
    pub deadline_minutes: Option<u64>,

    /// Maximum number of planner pages.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum commands per planner page.
    #[arg(long)]
    pub max_per_page: Option<usize>,

    /// Maximum repair rounds after validation.
    #[arg(long)]
    pub repair_rounds: Option<usize>,

    /// Maximum placeholder-resolution rounds.
    #[arg(long)]
    pub placeholder_rounds: Option<usize>,
}

/// Complete configuration used by the router, planner, and executor.
#[derive(Debug, Clone)]
pub struct ClankerConfig {
    pub utterance: String,
    pub provider_hint: Option<Provider>,
    pub mode: Mode,
    pub output: OutputFormat,
    pub deadline_minutes: u64,
    pub max_pages: usize,
    pub max_per_page: usize,
    pub repair_rounds: usize,
    pub placeholder_rounds: usize,
}

const DEFAULT_DEADLINE_MINUTES: u64 = 20;
const DEFAULT_MAX_PAGES: usize = 20;
const DEFAULT_MAX_PER_PAGE: usize = 8;
const DEFAULT_REPAIR_ROUNDS: usize = 3;
const DEFAULT_PLACEHOLDER_ROUNDS: usize = 5;

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl ClankerConfig {
    /// Merge CLI flags with `CLANKER_*` environment overrides. Explicit flag
    /// beats env var beats built-in default, mirroring the teacher's
    /// `from_env_and_args` convention.
    pub fn from_env_and_args(cli: CliArgs) -> Result<Self> {
        if cli.utterance.trim().is_empty() {
            return Err(ClankerError::Config("utterance must not be empty".into()));
        }

        let mode = if cli.apply { Mode::Apply } else { Mode::PlanOnly };

        Ok(Self {
            utterance: cli.utterance,
            provider_hint: cli.provider,
            mode,
            output: cli.output,
            deadline_minutes: cli
                .deadline_minutes
                .or_else(|| env_u64("CLANKER_DEADLINE_MINUTES"))
                .unwrap_or(DEFAULT_DEADLINE_MINUTES),
            max_pages: cli
                .max_pages
                .or_else(|| env_usize("CLANKER_MAX_PAGES"))
                .unwrap_or(DEFAULT_MAX_PAGES),
            max_per_page: cli
                .max_per_page
                .or_else(|| env_usize("CLANKER_MAX_PER_PAGE"))
                .unwrap_or(DEFAULT_MAX_PER_PAGE),
            repair_rounds: cli
                .repair_rounds
                .or_else(|| env_usize("CLANKER_REPAIR_ROUNDS"))
                .unwrap_or(DEFAULT_REPAIR_ROUNDS),
            placeholder_rounds: cli
                .placeholder_rounds
                .or_else(|| env_usize("CLANKER_PLACEHOLDER_ROUNDS"))
                .unwrap_or(DEFAULT_PLACEHOLDER_ROUNDS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn base_args() -> Vec<&'static str> {
        vec!["clanker", "why is checkout-api 500ing"]
    }

    #[test]
    fn defaults_to_plan_only() {
        let cli = CliArgs::parse_from(base_args());
        let config = ClankerConfig::from_env_and_args(cli).expect("config builds");
        assert_eq!(config.mode, Mode::PlanOnly);
        assert_eq!(config.deadline_minutes, DEFAULT_DEADLINE_MINUTES);
    }

    #[test]
    fn apply_flag_switches_mode() {
        let mut args = base_args();
        args.push("--apply");
        let cli = CliArgs::parse_from(args);
        let config = ClankerConfig::from_env_and_args(cli).expect("config builds");
        assert_eq!(config.mode, Mode::Apply);
    }

    #[test]
    fn rejects_empty_utterance() {
        let cli = CliArgs::parse_from(vec!["clanker", "   "]);
        let err = ClankerConfig::from_env_and_args(cli).unwrap_err();
        assert!(format!("{err}").contains("utterance"));
    }

    #[test]
    fn explicit_flag_overrides_default_bounds() {
        let mut args = base_args();
        args.push("--max-pages");
        args.push("5");
        let cli = CliArgs::parse_from(args);
        let config = ClankerConfig::from_env_and_args(cli).expect("config builds");
        assert_eq!(config.max_pages, 5);
    }
}
