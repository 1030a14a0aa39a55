#![forbid(unsafe_code)]

pub mod agents;
pub mod capability;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod intelligence;
pub mod intent;
pub mod investigation;
pub mod llm;
pub mod path_safety;
pub mod pipeline;
pub mod planner;
pub mod resolver;
pub mod router;
pub mod telemetry;

pub use config::{CliArgs, ClankerConfig, Mode, Provider};
pub use error::{ClankerError, Result};
pub use planner::plan::{Command, Plan};
