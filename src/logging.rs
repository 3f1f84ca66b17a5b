// THEORY:
// Tracing subscriber setup shared by the binaries.

use crate::error::{CamError, Result};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a stdout subscriber. `RUST_LOG` wins over `default_level` when set.
pub fn init(default_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| {
            CamError::configuration(
                format!("invalid log level `{default_level}`: {e}"),
                "use one of error, warn, info, debug, trace",
            )
        })?,
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| CamError::configuration(format!("logging already initialised: {e}"), "call logging::init once"))
}
