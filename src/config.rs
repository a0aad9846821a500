//! Console configuration loaded from `bridge.toml`.
//!
//! Missing keys fall back to defaults. `BRIDGE_LOG_LEVEL` overrides the file's
//! `log_level`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionOptions;

pub const DEFAULT_CONFIG_FILE: &str = "bridge.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit diagnostics as JSON lines.
    #[serde(default)]
    pub json_logs: bool,

    /// Switch the wallet to an EVM destination before the transfer and when minting starts.
    #[serde(default = "default_true")]
    pub auto_switch_network: bool,

    /// Retry a recoverable mint failure once.
    #[serde(default = "default_true")]
    pub retry_recoverable_mint: bool,

    #[serde(default = "default_from_chain")]
    pub default_from_chain: String,

    #[serde(default = "default_to_chain")]
    pub default_to_chain: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_from_chain() -> String {
    "Ethereum_Sepolia".to_string()
}

fn default_to_chain() -> String {
    "Base_Sepolia".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            auto_switch_network: true,
            retry_recoverable_mint: true,
            default_from_chain: default_from_chain(),
            default_to_chain: default_to_chain(),
        }
    }
}

impl BridgeConfig {
    /// Loads `bridge.toml` from the working directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<BridgeConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(level) = std::env::var("BRIDGE_LOG_LEVEL")
            && !level.is_empty()
        {
            config.log_level = level;
        }

        Ok(config)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_switch_network: self.auto_switch_network,
            retry_recoverable_mint: self.retry_recoverable_mint,
        }
    }
}
