//! The external bridging engine as seen by this crate.
//!
//! The engine performs approve, burn, attestation and mint on-chain and reports
//! progress through an event subscription. [`BridgeEngine`] is the seam; the
//! [`ScriptedEngine`] replays canned runs for the demo and for tests.

pub mod error;
pub mod scripted;
pub mod types;

use std::sync::Arc;

pub use error::EngineError;
pub use scripted::ScriptedEngine;
pub use types::{
    AdapterPair, BridgeEvent, BridgeParams, ChainInfo, EstimateResult, GasFee, Recoverability,
    ServiceFee, StepRecord, StepState, TransferResult,
};

/// Callback installed with [`BridgeEngine::on`].
pub type EventHandler = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Identifies one installed handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// Operations the bridging engine offers.
pub trait BridgeEngine {
    fn supported_chains(&self) -> Vec<ChainInfo>;

    async fn estimate(&self, params: &BridgeParams) -> Result<EstimateResult, EngineError>;

    async fn bridge(&self, params: &BridgeParams) -> Result<TransferResult, EngineError>;

    /// Resumes a failed transfer. The engine recovers everything but the
    /// adapters from `failed`.
    async fn retry(
        &self,
        failed: &TransferResult,
        adapters: &AdapterPair,
    ) -> Result<TransferResult, EngineError>;

    /// Installs a handler that receives every event the engine emits.
    fn on(&self, handler: EventHandler) -> HandlerId;

    fn off(&self, id: HandlerId);
}

/// Keeps a handler installed for as long as the guard lives.
pub struct Subscription<'a, E: BridgeEngine> {
    engine: &'a E,
    id: HandlerId,
}

impl<'a, E: BridgeEngine> Subscription<'a, E> {
    pub fn install(engine: &'a E, handler: EventHandler) -> Self {
        let id = engine.on(handler);
        tracing::trace!(handler = id.0, "engine handler installed");
        Self { engine, id }
    }
}

impl<E: BridgeEngine> Drop for Subscription<'_, E> {
    fn drop(&mut self) {
        self.engine.off(self.id);
        tracing::trace!(handler = self.id.0, "engine handler removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_removes_handler_on_drop() {
        let engine = ScriptedEngine::new(Vec::new());
        {
            let _sub = Subscription::install(&engine, Arc::new(|_: &BridgeEvent| {}));
            assert_eq!(engine.active_handlers(), 1);
        }
        assert_eq!(engine.active_handlers(), 0);
    }
}
