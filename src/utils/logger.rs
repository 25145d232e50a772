//! Logging configuration using tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for a plugin instance. The `debug` plugin option
/// raises the default level; `RUST_LOG` still wins when set.
pub fn init(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow::anyhow!("logging already initialized: {err}"))?;

    Ok(())
}
