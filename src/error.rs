use thiserror::Error;

use crate::engine::EngineError;
use crate::wallet::{ChainKind, SwitchError};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} wallet not connected")]
    AdapterNotReady(ChainKind),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Source and destination chain must differ")]
    SameChain,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Network switch failed: {0}")]
    NetworkSwitch(#[from] SwitchError),

    /// A step failed and was not (or could not be) recovered.
    #[error("{message}")]
    Transfer {
        step: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BridgeError {
    /// Failures that a fresh submit can never fix on its own.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::AdapterNotReady(_)
                | BridgeError::UnsupportedChain(_)
                | BridgeError::SameChain
                | BridgeError::InvalidAmount(_)
        )
    }
}
