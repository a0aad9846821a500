use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::BridgeConfig;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &BridgeConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        registry.with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(layer).init();
    }
}
