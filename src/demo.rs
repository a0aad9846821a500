//! Scripted engine runs behind the `demo` and `estimate` commands.

use crate::cli::Scenario;
use crate::config::BridgeConfig;
use crate::engine::scripted::{ScriptedRun, failed_step, step_event, success_step};
use crate::engine::{
    BridgeEvent, EngineError, EstimateResult, GasFee, Recoverability, ScriptedEngine, ServiceFee,
    StepState, TransferResult,
};
use crate::orchestrator::TransferOrchestrator;
use crate::session::{TransferForm, TransferSession};
use crate::wallet::{StaticSwitcher, WalletAdapter};

const APPROVE_TX: &str = "0x5d1f9a0c3e7b2a64c8e1f0d9b3a7c6e5f4d3c2b1a09f8e7d6c5b4a3928170615";
const BURN_TX: &str = "0x9b8a7c6d5e4f30211a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f7081";
const MINT_TX: &str = "0x1f2e3d4c5b6a79880716253443526170efdecdbcab9a89786756453423120100";
const RETRY_MINT_TX: &str = "0x7e6d5c4b3a2918070f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a6978";

fn through_attestation() -> Vec<BridgeEvent> {
    vec![
        step_event("approve", "pending", None),
        step_event("approve", "success", Some(APPROVE_TX)),
        step_event("burn", "pending", None),
        step_event("burn", "success", Some(BURN_TX)),
        step_event("fetchAttestation", "pending", None),
        step_event("fetchAttestation", "pending", None),
        step_event("fetchAttestation", "success", None),
        step_event("mint", "pending", None),
    ]
}

fn completed() -> TransferResult {
    TransferResult {
        state: StepState::Success,
        steps: vec![
            success_step("approve", Some(APPROVE_TX)),
            success_step("burn", Some(BURN_TX)),
            success_step("fetchAttestation", None),
            success_step("mint", Some(MINT_TX)),
        ],
    }
}

fn failed_at_mint(message: &str, recoverability: Recoverability) -> TransferResult {
    TransferResult {
        state: StepState::Error,
        steps: vec![
            success_step("approve", Some(APPROVE_TX)),
            success_step("burn", Some(BURN_TX)),
            success_step("fetchAttestation", None),
            failed_step("mint", message, recoverability),
        ],
    }
}

/// Loads the engine with the runs `scenario` needs.
pub fn scripted_engine(scenario: Scenario) -> ScriptedEngine {
    let engine = ScriptedEngine::with_testnet_chains();
    match scenario {
        Scenario::Happy => {
            let mut events = through_attestation();
            events.push(step_event("mint", "success", Some(MINT_TX)));
            engine.push_bridge(ScriptedRun::new(events, Ok(completed())));
        }
        Scenario::ApprovalFailure => {
            let events = vec![
                step_event("approve", "pending", None),
                step_event("approve", "error", None),
            ];
            let result = TransferResult {
                state: StepState::Error,
                steps: vec![failed_step(
                    "approve",
                    "User denied transaction signature",
                    Recoverability::Fatal,
                )],
            };
            engine.push_bridge(ScriptedRun::new(events, Ok(result)));
        }
        Scenario::MintRetry => {
            let mut events = through_attestation();
            events.push(step_event("mint", "error", None));
            engine.push_bridge(ScriptedRun::new(
                events,
                Ok(failed_at_mint(
                    "Mint transaction dropped from mempool",
                    Recoverability::Retryable,
                )),
            ));
            engine.push_retry(ScriptedRun::new(
                vec![
                    step_event("mint", "pending", None),
                    step_event("mint", "success", Some(RETRY_MINT_TX)),
                ],
                Ok(completed()),
            ));
        }
        Scenario::MintFatal => {
            let mut events = through_attestation();
            events.push(step_event("mint", "error", None));
            engine.push_bridge(ScriptedRun::new(
                events,
                Ok(failed_at_mint(
                    "Attestation already used on destination chain",
                    Recoverability::Fatal,
                )),
            ));
        }
        // Stops at the wallet before the engine is called.
        Scenario::SwitchRejected => {}
        Scenario::EngineOffline => {
            engine.push_bridge(ScriptedRun::new(
                vec![step_event("approve", "pending", None)],
                Err(EngineError::Transport(
                    "source chain RPC did not respond".to_string(),
                )),
            ));
        }
    }
    engine
}

/// The wallet the user holds in `scenario`.
pub fn switcher(scenario: Scenario) -> StaticSwitcher {
    match scenario {
        Scenario::SwitchRejected => StaticSwitcher::rejecting(),
        _ => StaticSwitcher::new(),
    }
}

/// A quote shaped like the engine's, for the route in `form`.
pub fn sample_estimate(form: &TransferForm) -> EstimateResult {
    EstimateResult {
        amount: form.amount.clone(),
        token: "USDC".to_string(),
        source: form.from_chain.clone(),
        destination: form.to_chain.clone(),
        gas_fees: vec![
            GasFee {
                name: "Approve".to_string(),
                token: "ETH".to_string(),
                blockchain: form.from_chain.clone(),
                fee: Some("0.000046".to_string()),
            },
            GasFee {
                name: "Burn".to_string(),
                token: "ETH".to_string(),
                blockchain: form.from_chain.clone(),
                fee: Some("0.000112".to_string()),
            },
            GasFee {
                name: "Mint".to_string(),
                token: "ETH".to_string(),
                blockchain: form.to_chain.clone(),
                fee: None,
            },
        ],
        fees: vec![ServiceFee {
            fee_type: "provider".to_string(),
            token: "USDC".to_string(),
            amount: None,
        }],
    }
}

/// A session over `engine` with both demo wallets connected.
pub fn session(
    engine: ScriptedEngine,
    switcher: StaticSwitcher,
    config: &BridgeConfig,
) -> TransferSession<ScriptedEngine, StaticSwitcher> {
    let mut session = TransferSession::new(
        TransferOrchestrator::new(engine, switcher),
        config.session_options(),
    );
    session.connect(WalletAdapter::evm("0x4b20993Bc481177ec7E8f571ceCaE8A9e22C02db"));
    session.connect(WalletAdapter::solana("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"));
    session
}
