use tracing_subscriber::EnvFilter;

use crate::error::{Result, ToolError};

/// Installs the global subscriber. Progress and diagnostics go to stderr so
/// stdout stays free for summaries; `RUST_LOG` overrides `default_directive`.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}
