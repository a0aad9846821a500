use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{
    AdapterPair, BridgeEngine, BridgeEvent, BridgeParams, EngineError, EstimateResult,
    EventHandler, Subscription, TransferResult,
};
use crate::error::BridgeError;
use crate::transfer::Effect;
use crate::wallet::NetworkSwitcher;

/// What the orchestrator is doing, readable from outside while a call runs.
#[derive(Debug, Clone, Default)]
pub struct EngineActivity {
    inner: Arc<ActivityState>,
}

#[derive(Debug, Default)]
struct ActivityState {
    loading: AtomicBool,
    estimating: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl EngineActivity {
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    pub fn is_estimating(&self) -> bool {
        self.inner.estimating.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_estimating()
    }

    /// Message of the most recent failed engine call.
    pub fn last_error(&self) -> Option<String> {
        self.error_slot().clone()
    }

    fn error_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a flag up until dropped, so a cancelled call clears it too.
struct Busy<'a>(&'a AtomicBool);

impl<'a> Busy<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sequences estimate, bridge and retry calls against the engine.
///
/// Each call installs one event subscription for its own duration and feeds
/// every event to the caller's `on_event` in emission order. Effects returned
/// by `on_event` are carried out alongside the running operation. Calls take
/// `&mut self`, so one orchestrator never runs two of them at once.
pub struct TransferOrchestrator<E, S> {
    engine: E,
    switcher: S,
    activity: EngineActivity,
}

impl<E: BridgeEngine, S: NetworkSwitcher> TransferOrchestrator<E, S> {
    pub fn new(engine: E, switcher: S) -> Self {
        Self {
            engine,
            switcher,
            activity: EngineActivity::default(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    pub fn activity(&self) -> EngineActivity {
        self.activity.clone()
    }

    pub async fn estimate(&mut self, params: &BridgeParams) -> Result<EstimateResult, BridgeError> {
        let outcome = {
            let _busy = Busy::raise(&self.activity.inner.estimating);
            self.engine.estimate(params).await
        };
        outcome.map_err(|e| self.record(e))
    }

    pub async fn bridge<F>(
        &mut self,
        params: &BridgeParams,
        on_event: F,
    ) -> Result<TransferResult, BridgeError>
    where
        F: FnMut(&BridgeEvent) -> Option<Effect>,
    {
        *self.activity.error_slot() = None;
        info!(from = %params.from_chain, to = %params.to_chain, amount = %params.amount, "bridge started");
        let outcome = {
            let _busy = Busy::raise(&self.activity.inner.loading);
            let (tx, mut rx) = mpsc::unbounded_channel();
            let _subscription = Subscription::install(&self.engine, forward_to(tx));
            pump(&self.switcher, &mut rx, self.engine.bridge(params), on_event).await
        };
        outcome.map_err(|e| self.record(e))
    }

    /// Resumes `failed`. Only the adapters are handed over; the engine recovers
    /// the rest of the transfer from the result itself.
    pub async fn retry<F>(
        &mut self,
        failed: &TransferResult,
        adapters: &AdapterPair,
        on_event: F,
    ) -> Result<TransferResult, BridgeError>
    where
        F: FnMut(&BridgeEvent) -> Option<Effect>,
    {
        info!(steps = failed.steps.len(), "retrying failed transfer");
        let outcome = {
            let _busy = Busy::raise(&self.activity.inner.loading);
            let (tx, mut rx) = mpsc::unbounded_channel();
            let _subscription = Subscription::install(&self.engine, forward_to(tx));
            pump(&self.switcher, &mut rx, self.engine.retry(failed, adapters), on_event).await
        };
        outcome.map_err(|e| self.record(e))
    }

    fn record(&self, err: EngineError) -> BridgeError {
        warn!(%err, "engine call failed");
        *self.activity.error_slot() = Some(err.to_string());
        BridgeError::Engine(err)
    }
}

fn forward_to(tx: mpsc::UnboundedSender<BridgeEvent>) -> EventHandler {
    Arc::new(move |event: &BridgeEvent| {
        if tx.send(event.clone()).is_err() {
            debug!("event arrived after its receiver closed");
        }
    })
}

/// Drives `operation` to completion while delivering queued events to
/// `on_event` and running the effects it asks for.
///
/// Effects still unanswered when the operation settles are dropped: the
/// wallet prompt has been raised, but its answer no longer matters.
async fn pump<S, T, F>(
    switcher: &S,
    events: &mut mpsc::UnboundedReceiver<BridgeEvent>,
    operation: impl Future<Output = Result<T, EngineError>>,
    mut on_event: F,
) -> Result<T, EngineError>
where
    S: NetworkSwitcher,
    F: FnMut(&BridgeEvent) -> Option<Effect>,
{
    tokio::pin!(operation);
    let mut effects: FuturesUnordered<LocalBoxFuture<'_, ()>> = FuturesUnordered::new();

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => {
                if let Some(effect) = on_event(&event) {
                    effects.push(perform(switcher, effect).boxed_local());
                }
            }
            Some(()) = effects.next(), if !effects.is_empty() => {}
            result = &mut operation => break result,
        }
    };

    // Events emitted right before the operation settled.
    while let Ok(event) = events.try_recv() {
        if let Some(effect) = on_event(&event) {
            effects.push(perform(switcher, effect).boxed_local());
        }
    }
    // One last poll raises any prompt not yet shown.
    while let Some(Some(())) = effects.next().now_or_never() {}
    if !effects.is_empty() {
        debug!(pending = effects.len(), "leaving unanswered network switch requests behind");
    }

    result
}

async fn perform<S: NetworkSwitcher>(switcher: &S, effect: Effect) {
    match effect {
        Effect::SwitchNetwork { chain_id } => match switcher.switch_chain(chain_id).await {
            Ok(()) => debug!(chain_id, "switched wallet network for mint"),
            Err(err) => warn!(chain_id, %err, "could not switch wallet network for mint"),
        },
    }
}

/// Renders an estimate as untimestamped log lines.
pub fn estimate_breakdown(estimate: &EstimateResult) -> Vec<String> {
    let mut lines = vec![format!(
        "Estimate: {} {} from {} to {}",
        estimate.amount, estimate.token, estimate.source, estimate.destination
    )];

    lines.push("Gas Fees:".to_string());
    if estimate.gas_fees.is_empty() {
        lines.push("  No gas fees found".to_string());
    }
    for gas in &estimate.gas_fees {
        lines.push(format!(
            "  {} ({}): {} {}",
            gas.name,
            gas.blockchain,
            gas.fee.as_deref().unwrap_or("N/A"),
            gas.token
        ));
    }

    lines.push("Other Fees:".to_string());
    if estimate.fees.is_empty() {
        lines.push("  No service fees found".to_string());
    }
    for fee in &estimate.fees {
        lines.push(format!(
            "  {}: {} {}",
            fee.fee_type,
            fee.amount.as_deref().unwrap_or("Free"),
            fee.token
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::scripted::{ScriptedRun, failed_step, step_event, success_step};
    use crate::engine::{GasFee, Recoverability, ScriptedEngine, ServiceFee, StepState};
    use crate::wallet::{StaticSwitcher, SwitchError, WalletAdapter};

    /// A wallet that shows the switch prompt and never gets an answer.
    #[derive(Default)]
    struct SilentWallet {
        asked: Mutex<Vec<u64>>,
    }

    impl NetworkSwitcher for SilentWallet {
        async fn switch_chain(&self, chain_id: u64) -> Result<(), SwitchError> {
            self.asked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(chain_id);
            std::future::pending().await
        }
    }

    fn params() -> BridgeParams {
        BridgeParams {
            from_chain: "Ethereum_Sepolia".into(),
            to_chain: "Base_Sepolia".into(),
            amount: "10".into(),
            recipient_address: None,
            adapters: AdapterPair {
                from_adapter: WalletAdapter::evm("0xabc"),
                to_adapter: WalletAdapter::evm("0xabc"),
            },
        }
    }

    fn succeeded() -> TransferResult {
        TransferResult {
            state: StepState::Success,
            steps: vec![
                success_step("approve", Some("0xa")),
                success_step("burn", Some("0xb")),
                success_step("fetchAttestation", None),
                success_step("mint", Some("0xm")),
            ],
        }
    }

    fn orchestrator(engine: ScriptedEngine) -> TransferOrchestrator<ScriptedEngine, StaticSwitcher> {
        TransferOrchestrator::new(engine, StaticSwitcher::new())
    }

    #[tokio::test]
    async fn bridge_forwards_events_in_order_and_unsubscribes() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_bridge(ScriptedRun::new(
            vec![
                step_event("approve", "success", Some("0xa")),
                step_event("burn", "success", Some("0xb")),
                step_event("fetchAttestation", "pending", None),
                step_event("fetchAttestation", "success", None),
                step_event("mint", "success", Some("0xm")),
            ],
            Ok(succeeded()),
        ));
        let mut orch = orchestrator(engine);

        let mut seen = Vec::new();
        let result = orch
            .bridge(&params(), |e| {
                seen.push(e.method().unwrap_or_default().to_string());
                None
            })
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            seen,
            vec!["approve", "burn", "fetchAttestation", "fetchAttestation", "mint"]
        );
        assert_eq!(orch.engine().active_handlers(), 0);
        assert_eq!(orch.engine().peak_handlers(), 1);
        assert!(!orch.activity().is_loading());
    }

    #[tokio::test]
    async fn engine_failure_still_unsubscribes_and_records_message() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_bridge(ScriptedRun::new(
            vec![step_event("approve", "pending", None)],
            Err(EngineError::Transport("rpc timeout".into())),
        ));
        let mut orch = orchestrator(engine);

        let mut events = 0;
        let err = orch
            .bridge(&params(), |_| {
                events += 1;
                None
            })
            .await
            .unwrap_err();

        assert_eq!(events, 1);
        assert!(matches!(err, BridgeError::Engine(EngineError::Transport(_))));
        assert_eq!(
            orch.activity().last_error().as_deref(),
            Some("engine transport failure: rpc timeout")
        );
        assert_eq!(orch.engine().active_handlers(), 0);
        assert!(!orch.activity().is_loading());
    }

    #[tokio::test]
    async fn switch_effects_run_and_rejections_are_not_fatal() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_bridge(ScriptedRun::new(
            vec![
                step_event("mint", "pending", None),
                step_event("mint", "success", Some("0xm")),
            ],
            Ok(succeeded()),
        ));
        let mut orch = TransferOrchestrator::new(engine, StaticSwitcher::rejecting());

        let result = orch
            .bridge(&params(), |e| {
                (e.value_str("state") == Some("pending"))
                    .then_some(Effect::SwitchNetwork { chain_id: 84532 })
            })
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(orch.switcher().requested(), vec![84532]);
    }

    #[tokio::test]
    async fn retry_uses_its_own_subscription() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_retry(ScriptedRun::new(
            vec![step_event("mint", "success", Some("0xretry"))],
            Ok(succeeded()),
        ));
        let mut orch = orchestrator(engine);
        let failed = TransferResult {
            state: StepState::Error,
            steps: vec![failed_step("mint", "nonce too low", Recoverability::Retryable)],
        };

        let mut hashes = Vec::new();
        let result = orch
            .retry(&failed, &params().adapters, |e| {
                hashes.extend(e.value_str("txHash").map(str::to_string));
                None
            })
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(hashes, vec!["0xretry"]);
        assert_eq!(orch.engine().retry_calls(), 1);
        assert_eq!(orch.engine().bridge_calls(), 0);
        assert_eq!(orch.engine().active_handlers(), 0);
    }

    #[tokio::test]
    async fn estimate_clears_flag_on_failure() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_estimate(Err(EngineError::Rejected("route unavailable".into())));
        let mut orch = orchestrator(engine);

        let err = orch.estimate(&params()).await.unwrap_err();
        assert_eq!(err.to_string(), "engine rejected request: route unavailable");
        assert!(!orch.activity().is_estimating());
        assert_eq!(orch.engine().estimate_calls(), 1);
    }

    fn estimate(gas_fees: Vec<GasFee>, fees: Vec<ServiceFee>) -> EstimateResult {
        EstimateResult {
            amount: "25".into(),
            token: "USDC".into(),
            source: "Ethereum_Sepolia".into(),
            destination: "Base_Sepolia".into(),
            gas_fees,
            fees,
        }
    }

    #[test]
    fn breakdown_lists_gas_fees_in_order_and_no_service_fees() {
        let lines = estimate_breakdown(&estimate(
            vec![
                GasFee {
                    name: "Approve".into(),
                    token: "ETH".into(),
                    blockchain: "Ethereum_Sepolia".into(),
                    fee: Some("0.0001".into()),
                },
                GasFee {
                    name: "Burn".into(),
                    token: "ETH".into(),
                    blockchain: "Ethereum_Sepolia".into(),
                    fee: None,
                },
            ],
            vec![],
        ));

        assert_eq!(
            lines,
            vec![
                "Estimate: 25 USDC from Ethereum_Sepolia to Base_Sepolia",
                "Gas Fees:",
                "  Approve (Ethereum_Sepolia): 0.0001 ETH",
                "  Burn (Ethereum_Sepolia): N/A ETH",
                "Other Fees:",
                "  No service fees found",
            ]
        );
        assert_eq!(
            lines.iter().filter(|l| *l == "  No service fees found").count(),
            1
        );
    }

    #[test]
    fn breakdown_without_gas_fees() {
        let lines = estimate_breakdown(&estimate(
            vec![],
            vec![
                ServiceFee {
                    fee_type: "provider".into(),
                    token: "USDC".into(),
                    amount: Some("0.25".into()),
                },
                ServiceFee {
                    fee_type: "forwarder".into(),
                    token: "USDC".into(),
                    amount: None,
                },
            ],
        ));
        assert_eq!(lines[2], "  No gas fees found");
        assert_eq!(lines[4], "  provider: 0.25 USDC");
        assert_eq!(lines[5], "  forwarder: Free USDC");
    }

    #[tokio::test]
    async fn loading_flag_is_visible_while_bridge_runs() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_bridge(ScriptedRun::new(
            vec![step_event("approve", "pending", None)],
            Ok(succeeded()),
        ));
        let mut orch = orchestrator(engine);
        let activity = orch.activity();
        assert!(!activity.is_busy());

        let mut seen_loading = Vec::new();
        orch.bridge(&params(), |_| {
            seen_loading.push(activity.is_loading());
            None
        })
        .await
        .unwrap();

        assert_eq!(seen_loading, vec![true]);
        assert!(!activity.is_busy());
    }

    #[tokio::test]
    async fn unanswered_switch_prompt_does_not_hold_the_result() {
        let engine = ScriptedEngine::with_testnet_chains();
        engine.push_bridge(ScriptedRun::new(
            vec![
                step_event("mint", "pending", None),
                step_event("mint", "success", Some("0xm")),
            ],
            Ok(succeeded()),
        ));
        let mut orch = TransferOrchestrator::new(engine, SilentWallet::default());

        let bridged = tokio::time::timeout(
            Duration::from_secs(1),
            orch.bridge(&params(), |e| {
                (e.value_str("state") == Some("pending"))
                    .then_some(Effect::SwitchNetwork { chain_id: 84532 })
            }),
        )
        .await
        .expect("bridge must settle without a wallet answer");

        assert!(bridged.unwrap().is_success());
        assert_eq!(*orch.switcher().asked.lock().unwrap(), vec![84532]);
        assert!(!orch.activity().is_loading());
    }
}
