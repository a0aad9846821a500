//! An in-memory [`BridgeEngine`] that replays scripted runs.
//!
//! Each `bridge`/`retry` call pops the next [`ScriptedRun`], delivers its events
//! in order to every installed handler, then returns its result. Routes between
//! chains it does not list are rejected before anything is popped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::json;

use super::types::{
    AdapterPair, BridgeEvent, BridgeParams, ChainInfo, EstimateResult, Recoverability, StepError,
    StepRecord, StepState, TransferResult,
};
use super::{BridgeEngine, EngineError, EventHandler, HandlerId};
use crate::wallet::ChainKind;

/// Events to emit and the result to return for one engine invocation.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub events: Vec<BridgeEvent>,
    pub result: Result<TransferResult, EngineError>,
}

impl ScriptedRun {
    pub fn new(events: Vec<BridgeEvent>, result: Result<TransferResult, EngineError>) -> Self {
        Self { events, result }
    }
}

pub struct ScriptedEngine {
    chains: Vec<ChainInfo>,
    handlers: Mutex<Vec<(HandlerId, EventHandler)>>,
    next_handler: AtomicU64,
    peak_handlers: AtomicUsize,
    bridge_runs: Mutex<VecDeque<ScriptedRun>>,
    retry_runs: Mutex<VecDeque<ScriptedRun>>,
    estimates: Mutex<VecDeque<Result<EstimateResult, EngineError>>>,
    bridge_calls: AtomicUsize,
    retry_calls: AtomicUsize,
    estimate_calls: AtomicUsize,
}

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedEngine {
    pub fn new(chains: Vec<ChainInfo>) -> Self {
        Self {
            chains,
            handlers: Mutex::new(Vec::new()),
            next_handler: AtomicU64::new(1),
            peak_handlers: AtomicUsize::new(0),
            bridge_runs: Mutex::new(VecDeque::new()),
            retry_runs: Mutex::new(VecDeque::new()),
            estimates: Mutex::new(VecDeque::new()),
            bridge_calls: AtomicUsize::new(0),
            retry_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_testnet_chains() -> Self {
        Self::new(testnet_chains())
    }

    pub fn push_bridge(&self, run: ScriptedRun) -> &Self {
        locked(&self.bridge_runs).push_back(run);
        self
    }

    pub fn push_retry(&self, run: ScriptedRun) -> &Self {
        locked(&self.retry_runs).push_back(run);
        self
    }

    pub fn push_estimate(&self, estimate: Result<EstimateResult, EngineError>) -> &Self {
        locked(&self.estimates).push_back(estimate);
        self
    }

    pub fn bridge_calls(&self) -> usize {
        self.bridge_calls.load(Ordering::SeqCst)
    }

    pub fn retry_calls(&self) -> usize {
        self.retry_calls.load(Ordering::SeqCst)
    }

    pub fn estimate_calls(&self) -> usize {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn active_handlers(&self) -> usize {
        locked(&self.handlers).len()
    }

    /// Largest number of handlers installed at the same time so far.
    pub fn peak_handlers(&self) -> usize {
        self.peak_handlers.load(Ordering::SeqCst)
    }

    async fn play(&self, run: ScriptedRun) -> Result<TransferResult, EngineError> {
        for event in &run.events {
            // Snapshot so a handler may call back into the engine.
            let targets: Vec<EventHandler> = locked(&self.handlers)
                .iter()
                .map(|(_, handler)| handler.clone())
                .collect();
            for handler in targets {
                handler(event);
            }
            tokio::task::yield_now().await;
        }
        run.result
    }

    fn check_route(&self, params: &BridgeParams) -> Result<(), EngineError> {
        for name in [&params.from_chain, &params.to_chain] {
            if !self.chains.iter().any(|c| &c.chain == name) {
                return Err(EngineError::Rejected(format!("unsupported chain {name}")));
            }
        }
        Ok(())
    }
}

impl BridgeEngine for ScriptedEngine {
    fn supported_chains(&self) -> Vec<ChainInfo> {
        self.chains.clone()
    }

    async fn estimate(&self, params: &BridgeParams) -> Result<EstimateResult, EngineError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_route(params)?;
        tokio::task::yield_now().await;
        locked(&self.estimates)
            .pop_front()
            .unwrap_or(Err(EngineError::Unavailable("estimate")))
    }

    async fn bridge(&self, params: &BridgeParams) -> Result<TransferResult, EngineError> {
        self.bridge_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(from = %params.from_chain, to = %params.to_chain, amount = %params.amount, "scripted bridge");
        self.check_route(params)?;
        let run = locked(&self.bridge_runs).pop_front();
        match run {
            Some(run) => self.play(run).await,
            None => Err(EngineError::Unavailable("bridge run")),
        }
    }

    async fn retry(
        &self,
        _failed: &TransferResult,
        _adapters: &AdapterPair,
    ) -> Result<TransferResult, EngineError> {
        self.retry_calls.fetch_add(1, Ordering::SeqCst);
        let run = locked(&self.retry_runs).pop_front();
        match run {
            Some(run) => self.play(run).await,
            None => Err(EngineError::Unavailable("retry run")),
        }
    }

    fn on(&self, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::SeqCst));
        let mut handlers = locked(&self.handlers);
        handlers.push((id, handler));
        self.peak_handlers.fetch_max(handlers.len(), Ordering::SeqCst);
        id
    }

    fn off(&self, id: HandlerId) {
        locked(&self.handlers).retain(|(h, _)| *h != id);
    }
}

/// Builds a lifecycle event in the engine's wire shape.
pub fn step_event(method: &str, state: &str, tx_hash: Option<&str>) -> BridgeEvent {
    let mut values = json!({ "state": state });
    if let Some(hash) = tx_hash {
        values["txHash"] = json!(hash);
    }
    BridgeEvent::new(json!({ "protocol": "cctp", "method": method, "values": values }))
}

pub fn success_step(name: &str, tx_hash: Option<&str>) -> StepRecord {
    StepRecord {
        name: name.to_string(),
        state: StepState::Success,
        tx_hash: tx_hash.map(str::to_string),
        error_message: None,
        error: None,
    }
}

pub fn failed_step(name: &str, message: &str, recoverability: Recoverability) -> StepRecord {
    StepRecord {
        name: name.to_string(),
        state: StepState::Error,
        tx_hash: None,
        error_message: Some(message.to_string()),
        error: Some(StepError {
            message: Some(message.to_string()),
            recoverability,
        }),
    }
}

pub fn testnet_chains() -> Vec<ChainInfo> {
    vec![
        ChainInfo {
            chain: "Ethereum_Sepolia".into(),
            name: "Ethereum Sepolia".into(),
            kind: ChainKind::Evm,
            chain_id: Some(11_155_111),
        },
        ChainInfo {
            chain: "Base_Sepolia".into(),
            name: "Base Sepolia".into(),
            kind: ChainKind::Evm,
            chain_id: Some(84_532),
        },
        ChainInfo {
            chain: "Arbitrum_Sepolia".into(),
            name: "Arbitrum Sepolia".into(),
            kind: ChainKind::Evm,
            chain_id: Some(421_614),
        },
        ChainInfo {
            chain: "Solana_Devnet".into(),
            name: "Solana Devnet".into(),
            kind: ChainKind::Solana,
            chain_id: None,
        },
    ]
}
