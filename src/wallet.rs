//! Wallet-side collaborators: adapter handles and the EVM network switch.
//!
//! Adapters are opaque to this crate. They are selected by [`ChainKind`] and
//! handed to the bridging engine untouched.

use std::fmt;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signing ecosystem a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Evm,
    Solana,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Evm => write!(f, "EVM"),
            ChainKind::Solana => write!(f, "Solana"),
        }
    }
}

/// A connected wallet, passed to the engine as `fromAdapter` / `toAdapter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAdapter {
    pub kind: ChainKind,
    pub address: String,
}

impl WalletAdapter {
    pub fn evm(address: impl Into<String>) -> Self {
        Self {
            kind: ChainKind::Evm,
            address: address.into(),
        }
    }

    pub fn solana(address: impl Into<String>) -> Self {
        Self {
            kind: ChainKind::Solana,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwitchError {
    #[error("user rejected switch to chain {chain_id}")]
    Rejected { chain_id: u64 },
}

/// Switches the active EVM network of the connected wallet.
pub trait NetworkSwitcher {
    async fn switch_chain(&self, chain_id: u64) -> Result<(), SwitchError>;
}

/// In-process switcher that records every request and can be told to refuse.
#[derive(Debug, Default)]
pub struct StaticSwitcher {
    reject: bool,
    requested: Mutex<Vec<u64>>,
}

impl StaticSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A switcher whose every request is rejected, as when the user dismisses the wallet prompt.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<u64> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NetworkSwitcher for StaticSwitcher {
    async fn switch_chain(&self, chain_id: u64) -> Result<(), SwitchError> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chain_id);
        tokio::task::yield_now().await;
        if self.reject {
            return Err(SwitchError::Rejected { chain_id });
        }
        tracing::debug!(chain_id, "wallet network switched");
        Ok(())
    }
}
