use tracing_subscriber::EnvFilter;

use crate::cryoet::alignment::error::{Result, ToolError};

/// Installs a stderr `fmt` subscriber. `RUST_LOG` takes precedence over
/// `default_directive`.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|err| ToolError::Logging(format!("invalid filter '{default_directive}': {err}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}
