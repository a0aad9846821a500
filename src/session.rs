//! One user's transfer session: validates the form, runs the orchestrator and
//! reconciles engine results into the success / failed flags the UI shows.
//!
//! Retry policy: a failed `mint` step classified `RETRYABLE` or `RESUMABLE`
//! gets exactly one automatic retry. Every other failure ends the attempt.

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::engine::{
    AdapterPair, BridgeEngine, BridgeParams, ChainInfo, EstimateResult, StepRecord,
    TransferResult,
};
use crate::error::BridgeError;
use crate::orchestrator::{EngineActivity, TransferOrchestrator, estimate_breakdown};
use crate::transfer::{Method, ProgressHandle, Ticket};
use crate::wallet::{ChainKind, NetworkSwitcher, WalletAdapter};

/// What the user typed into the transfer form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferForm {
    pub from_chain: String,
    pub to_chain: String,
    pub amount: String,
    pub recipient: Option<String>,
}

/// UI-visible result of the latest submit. `success` and `failed` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitStatus {
    pub success: bool,
    pub failed: bool,
    pub error_message: Option<String>,
    pub completed_amount: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub auto_switch_network: bool,
    pub retry_recoverable_mint: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_switch_network: true,
            retry_recoverable_mint: true,
        }
    }
}

/// A finished transfer. The caller should refresh balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub transfer_id: Uuid,
    pub amount: String,
    pub retried: bool,
    pub result: TransferResult,
}

pub struct TransferSession<E, S> {
    orchestrator: TransferOrchestrator<E, S>,
    progress: ProgressHandle,
    options: SessionOptions,
    evm_wallet: Option<WalletAdapter>,
    solana_wallet: Option<WalletAdapter>,
    status: SubmitStatus,
}

fn is_retryable_mint(step: &StepRecord) -> bool {
    Method::from_name(&step.name) == Some(Method::Mint) && step.recoverability().is_recoverable()
}

impl<E: BridgeEngine, S: NetworkSwitcher> TransferSession<E, S> {
    pub fn new(orchestrator: TransferOrchestrator<E, S>, options: SessionOptions) -> Self {
        Self {
            orchestrator,
            progress: ProgressHandle::new(),
            options,
            evm_wallet: None,
            solana_wallet: None,
            status: SubmitStatus::default(),
        }
    }

    pub fn connect(&mut self, adapter: WalletAdapter) {
        match adapter.kind {
            ChainKind::Evm => self.evm_wallet = Some(adapter),
            ChainKind::Solana => self.solana_wallet = Some(adapter),
        }
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn status(&self) -> &SubmitStatus {
        &self.status
    }

    pub fn orchestrator(&self) -> &TransferOrchestrator<E, S> {
        &self.orchestrator
    }

    /// Loading flags of the engine calls this session makes.
    pub fn activity(&self) -> EngineActivity {
        self.orchestrator.activity()
    }

    /// Discards the current attempt's progress and flags.
    pub fn reset(&mut self) {
        self.progress.reset();
        self.status = SubmitStatus::default();
    }

    fn wallet_for(&self, kind: ChainKind) -> Result<WalletAdapter, BridgeError> {
        let wallet = match kind {
            ChainKind::Evm => &self.evm_wallet,
            ChainKind::Solana => &self.solana_wallet,
        };
        wallet.clone().ok_or(BridgeError::AdapterNotReady(kind))
    }

    fn prepare(&self, form: &TransferForm) -> Result<(BridgeParams, ChainInfo), BridgeError> {
        let chains = self.orchestrator.engine().supported_chains();
        let find = |name: &str| {
            chains
                .iter()
                .find(|c| c.chain == name)
                .cloned()
                .ok_or_else(|| BridgeError::UnsupportedChain(name.to_string()))
        };
        let source = find(&form.from_chain)?;
        let destination = find(&form.to_chain)?;
        if source.chain == destination.chain {
            return Err(BridgeError::SameChain);
        }

        let amount = form.amount.trim();
        match amount.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => {}
            _ => return Err(BridgeError::InvalidAmount(form.amount.clone())),
        }

        let adapters = AdapterPair {
            from_adapter: self.wallet_for(source.kind)?,
            to_adapter: self.wallet_for(destination.kind)?,
        };
        let recipient_address = form
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let params = BridgeParams {
            from_chain: source.chain,
            to_chain: destination.chain.clone(),
            amount: amount.to_string(),
            recipient_address,
            adapters,
        };
        Ok((params, destination))
    }

    /// Quotes the transfer and writes the fee breakdown to the log without timestamps.
    pub async fn estimate(&mut self, form: &TransferForm) -> Result<EstimateResult, BridgeError> {
        let outcome = match self.prepare(form) {
            Ok((params, _)) => self.orchestrator.estimate(&params).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(estimate) => {
                for line in estimate_breakdown(&estimate) {
                    self.progress.add_log(line, false);
                }
                Ok(estimate)
            }
            Err(err) => {
                self.progress.add_log(format!("Estimate error: {err}"), false);
                Err(err)
            }
        }
    }

    /// Runs one submit cycle. On success the form's amount is cleared.
    pub async fn submit(&mut self, form: &mut TransferForm) -> Result<CompletedTransfer, BridgeError> {
        let transfer_id = Uuid::new_v4();
        let span = info_span!("transfer", %transfer_id, from = %form.from_chain, to = %form.to_chain);
        self.run_attempt(form, transfer_id).instrument(span).await
    }

    async fn run_attempt(
        &mut self,
        form: &mut TransferForm,
        transfer_id: Uuid,
    ) -> Result<CompletedTransfer, BridgeError> {
        self.reset();
        let (params, destination) = match self.prepare(form) {
            Ok(prepared) => prepared,
            Err(err) => return Err(self.fail(None, err)),
        };

        let switch_target = if self.options.auto_switch_network {
            destination.evm_chain_id()
        } else {
            None
        };
        // Everything written from here on belongs to this attempt only.
        let ticket = self.progress.begin(switch_target);
        if let Some(chain_id) = switch_target
            && let Err(err) = self.orchestrator.switcher().switch_chain(chain_id).await
        {
            warn!(chain_id, %err, "network switch rejected before transfer");
            return Err(self.fail(Some(ticket), err.into()));
        }

        let progress = self.progress.clone();
        let first = self
            .orchestrator
            .bridge(&params, |event| progress.handle_event_for(ticket, event))
            .await;
        let result = match first {
            Ok(result) => result,
            Err(err) => return Err(self.fail(Some(ticket), err)),
        };
        if result.is_success() {
            return Ok(self.succeed(ticket, form, transfer_id, false, result));
        }

        let failed_step = result.first_failed_step().cloned();
        let step = failed_step.as_ref().map(|s| s.name.clone());
        let message = failed_step
            .as_ref()
            .and_then(StepRecord::failure_message)
            .unwrap_or("Bridge failed")
            .to_string();

        if self.options.retry_recoverable_mint && failed_step.as_ref().is_some_and(is_retryable_mint) {
            info!(%message, "mint failed with a recoverable error, retrying once");
            let retried = self
                .orchestrator
                .retry(&result, &params.adapters, |event| {
                    progress.handle_event_for(ticket, event)
                })
                .await;
            match retried {
                Ok(retried) if retried.is_success() => {
                    self.progress.add_log_for(
                        ticket,
                        "Transfer completed successfully after retry",
                        true,
                    );
                    return Ok(self.succeed(ticket, form, transfer_id, true, retried));
                }
                Ok(retried) => {
                    let reason = retried
                        .first_failed_step()
                        .and_then(StepRecord::failure_message)
                        .unwrap_or("retry did not complete")
                        .to_string();
                    warn!(%reason, "retry did not succeed");
                    self.progress
                        .add_log_for(ticket, format!("Retry failed: {reason}"), true);
                }
                Err(err) => {
                    warn!(%err, "retry failed");
                    self.progress
                        .add_log_for(ticket, format!("Retry failed: {err}"), true);
                }
            }
        }

        Err(self.fail(Some(ticket), BridgeError::Transfer { step, message }))
    }

    /// Records the success unless the attempt was reset meanwhile, in which
    /// case the form and flags are left as the reset put them.
    fn succeed(
        &mut self,
        ticket: Ticket,
        form: &mut TransferForm,
        transfer_id: Uuid,
        retried: bool,
        result: TransferResult,
    ) -> CompletedTransfer {
        if !self.progress.is_current(ticket) {
            debug!(retried, "transfer completed after its attempt was reset");
            return CompletedTransfer {
                transfer_id,
                amount: form.amount.clone(),
                retried,
                result,
            };
        }
        let amount = std::mem::take(&mut form.amount);
        info!(%amount, retried, "transfer completed");
        self.status = SubmitStatus {
            success: true,
            failed: false,
            error_message: None,
            completed_amount: Some(amount.clone()),
        };
        CompletedTransfer {
            transfer_id,
            amount,
            retried,
            result,
        }
    }

    /// Records the failure. With a `ticket`, nothing is recorded once that
    /// attempt has been reset.
    fn fail(&mut self, ticket: Option<Ticket>, err: BridgeError) -> BridgeError {
        warn!(%err, fatal = err.is_fatal(), "transfer failed");
        let line = format!("Error: {err}");
        let recorded = match ticket {
            Some(ticket) => self.progress.add_log_for(ticket, line, true),
            None => {
                self.progress.add_log(line, true);
                true
            }
        };
        if recorded {
            self.status = SubmitStatus {
                success: false,
                failed: true,
                error_message: Some(err.to_string()),
                completed_amount: None,
            };
        }
        err
    }
}
