//! In-memory shapes exchanged with the bridging engine.
//!
//! Field names follow the engine's camelCase JSON so results and events can be
//! deserialized straight from what the engine hands back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wallet::{ChainKind, WalletAdapter};

/// A raw lifecycle event as emitted by the engine.
///
/// Nothing about its shape is trusted; the transfer module normalizes it
/// before anything reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeEvent(pub Value);

impl BridgeEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn method(&self) -> Option<&str> {
        self.0.get("method").and_then(Value::as_str)
    }

    /// Reads a string field under the nested `values` object.
    pub fn value_str(&self, key: &str) -> Option<&str> {
        self.0
            .get("values")
            .and_then(|values| values.get(key))
            .and_then(Value::as_str)
    }
}

/// A chain the engine can bridge to or from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Engine identifier, e.g. `Base_Sepolia`.
    pub chain: String,
    /// Display name.
    pub name: String,
    pub kind: ChainKind,
    /// EVM chain id; `None` for non-EVM chains.
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl ChainInfo {
    /// The EVM network the wallet has to be on to act on this chain, if any.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self.kind {
            ChainKind::Evm => self.chain_id,
            ChainKind::Solana => None,
        }
    }
}

/// Source and destination wallets for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterPair {
    pub from_adapter: WalletAdapter,
    pub to_adapter: WalletAdapter,
}

/// Arguments of the engine's `estimate` and `bridge` operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeParams {
    pub from_chain: String,
    pub to_chain: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    #[serde(flatten)]
    pub adapters: AdapterPair,
}

/// Terminal state of a step or of a whole engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Success,
    Error,
    #[serde(other)]
    Other,
}

/// Engine classification of whether a failed step may be attempted again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recoverability {
    Retryable,
    Resumable,
    #[default]
    #[serde(other)]
    Fatal,
}

impl Recoverability {
    pub fn is_recoverable(self) -> bool {
        matches!(self, Recoverability::Retryable | Recoverability::Resumable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub recoverability: Recoverability,
}

/// One step (`approve`, `burn`, `fetchAttestation`, `mint`) of an engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: String,
    pub state: StepState,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error: Option<StepError>,
}

impl StepRecord {
    pub fn recoverability(&self) -> Recoverability {
        self.error
            .as_ref()
            .map(|e| e.recoverability)
            .unwrap_or_default()
    }

    /// Human-readable failure reason, preferring the step's own message.
    pub fn failure_message(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or_else(|| self.error.as_ref().and_then(|e| e.message.as_deref()))
    }
}

/// Outcome of a `bridge` or `retry` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub state: StepState,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl TransferResult {
    /// Overall success with no failed step.
    pub fn is_success(&self) -> bool {
        self.state == StepState::Success && self.first_failed_step().is_none()
    }

    pub fn first_failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.state == StepState::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFee {
    pub name: String,
    pub token: String,
    pub blockchain: String,
    #[serde(default)]
    pub fee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFee {
    #[serde(rename = "type")]
    pub fee_type: String,
    pub token: String,
    #[serde(default)]
    pub amount: Option<String>,
}

/// Quote returned by the engine's `estimate` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResult {
    pub amount: String,
    pub token: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub gas_fees: Vec<GasFee>,
    #[serde(default)]
    pub fees: Vec<ServiceFee>,
}
