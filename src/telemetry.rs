use tracing_subscriber::EnvFilter;

use crate::error::{ClankerError, Result};

/// Initialize the global `tracing` subscriber. Respects `RUST_LOG`, defaults
/// to `info` for this crate and `warn` elsewhere.
pub fn init() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,clanker=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| ClankerError::Other(format!("telemetry init failed: {err}")))
}

/// Opens an `info_span!` for one top-level phase of a request (router,
/// investigation, planning, validation, repair, resolution, execution),
/// tagging it with the utterance and provider so downstream logs nest under
/// it. Mirrors the teacher's `apply.rs::stage_span` per-stage span.
#[macro_export]
macro_rules! phase_span {
    ($phase:expr, $utterance_id:expr, $provider:expr) => {
        tracing::info_span!(
            "phase",
            phase = $phase,
            utterance_id = %$utterance_id,
            provider = %$provider,
        )
    };
}
