use tracing::debug;

use super::event::{Method, NormalizedEvent, Outcome, normalize};
use super::log::TransferLog;
use super::phase::Phase;
use crate::engine::BridgeEvent;

/// A side effect requested by a transition, carried out by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Put the wallet on the destination EVM network before minting.
    SwitchNetwork { chain_id: u64 },
}

/// Identifies the attempt an event stream belongs to.
///
/// Every `reset` and `begin` invalidates tickets handed out earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// Tracks the phase and log of one transfer session.
#[derive(Debug)]
pub struct ProgressStateMachine {
    phase: Phase,
    log: TransferLog,
    generation: u64,
    switch_target: Option<u64>,
}

impl ProgressStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            log: TransferLog::new(),
            generation: 0,
            switch_target: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn log(&self) -> &TransferLog {
        &self.log
    }

    pub fn add_log(&mut self, line: impl Into<String>, timestamped: bool) {
        self.log.push(line, timestamped);
    }

    /// Back to `idle` with an empty log. Events from earlier attempts are ignored afterwards.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.log.clear();
        self.switch_target = None;
        self.generation += 1;
        debug!(generation = self.generation, "progress reset");
    }

    /// Starts a new attempt. `switch_target` is the EVM chain the wallet must be
    /// on when minting begins, if the destination needs one.
    pub fn begin(&mut self, switch_target: Option<u64>) -> Ticket {
        self.generation += 1;
        self.switch_target = switch_target;
        debug!(generation = self.generation, ?switch_target, "attempt started");
        Ticket {
            generation: self.generation,
        }
    }

    pub fn handle_event(&mut self, event: &BridgeEvent) -> Option<Effect> {
        self.apply(normalize(event))
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }

    /// Appends a line only if `ticket` belongs to the current attempt.
    pub fn add_log_for(
        &mut self,
        ticket: Ticket,
        line: impl Into<String>,
        timestamped: bool,
    ) -> bool {
        if !self.is_current(ticket) {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "log line from superseded attempt dropped"
            );
            return false;
        }
        self.add_log(line, timestamped);
        true
    }

    /// Applies `event` only if `ticket` belongs to the current attempt.
    pub fn handle_event_for(&mut self, ticket: Ticket, event: &BridgeEvent) -> Option<Effect> {
        if !self.is_current(ticket) {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                method = event.method(),
                "event from superseded attempt ignored"
            );
            return None;
        }
        self.handle_event(event)
    }

    pub fn apply(&mut self, event: NormalizedEvent) -> Option<Effect> {
        let NormalizedEvent::Step {
            method,
            outcome,
            tx_hash,
        } = event
        else {
            return None;
        };

        let target = target_phase(method, outcome);
        if !self.phase.admits(target) {
            debug!(%method, ?outcome, from = %self.phase, to = %target, "out-of-order event ignored");
            return None;
        }

        let hash = tx_hash.as_deref().unwrap_or("unknown");
        match (method, outcome) {
            (Method::Approve, Outcome::Success) => {
                self.stamp(format!("USDC Approval Tx: {hash}"));
                self.enter(Phase::Burning);
                self.stamp("Burning USDC...");
            }
            (Method::Approve, Outcome::Error) => {
                self.stamp("❌ Approval failed");
                self.enter(Phase::Error);
            }
            (Method::Burn, Outcome::Success) => {
                self.stamp(format!("Burn Tx: {hash}"));
                self.enter(Phase::WaitingAttestation);
                self.stamp("Waiting for attestation...");
            }
            (Method::Burn, Outcome::Error) => {
                self.stamp("❌ Burn failed");
                self.enter(Phase::Error);
            }
            (Method::FetchAttestation, Outcome::Success) => {
                self.stamp("Attestation retrieved!");
                self.enter(Phase::Minting);
                self.stamp("Minting USDC...");
            }
            (Method::FetchAttestation, _) => {
                self.stamp("Waiting for attestation...");
                self.enter(Phase::WaitingAttestation);
            }
            (Method::Mint, Outcome::Success) => {
                self.stamp(format!("Mint Tx: {hash}"));
                self.stamp("Transfer completed successfully.");
                self.enter(Phase::Completed);
            }
            (Method::Mint, Outcome::Error) => {
                self.stamp("❌ Mint failed");
                self.enter(Phase::Error);
            }
            (Method::Mint, Outcome::Pending) => {
                self.enter(Phase::Minting);
                return self
                    .switch_target
                    .map(|chain_id| Effect::SwitchNetwork { chain_id });
            }
            (Method::Approve | Method::Burn, Outcome::Pending) => self.enter(target),
        }
        None
    }

    fn stamp(&mut self, line: impl Into<String>) {
        self.log.push(line, true);
    }

    fn enter(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = %self.phase, to = %next, "phase transition");
        }
        self.phase = next;
    }
}

impl Default for ProgressStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn target_phase(method: Method, outcome: Outcome) -> Phase {
    match (method, outcome) {
        (_, Outcome::Error) if method != Method::FetchAttestation => Phase::Error,
        (Method::Approve, Outcome::Pending) => Phase::Approving,
        (Method::Approve, _) => Phase::Burning,
        (Method::Burn, Outcome::Pending) => Phase::Burning,
        (Method::Burn, _) => Phase::WaitingAttestation,
        (Method::FetchAttestation, Outcome::Success) => Phase::Minting,
        (Method::FetchAttestation, _) => Phase::WaitingAttestation,
        (Method::Mint, Outcome::Pending) => Phase::Minting,
        (Method::Mint, _) => Phase::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::step_event;
    use serde_json::json;

    fn drive(machine: &mut ProgressStateMachine, events: &[BridgeEvent]) -> Vec<Phase> {
        events
            .iter()
            .map(|e| {
                machine.handle_event(e);
                machine.phase()
            })
            .collect()
    }

    #[test]
    fn happy_path_walks_all_phases() {
        let mut m = ProgressStateMachine::new();
        assert_eq!(m.phase(), Phase::Idle);

        let phases = drive(
            &mut m,
            &[
                step_event("approve", "success", Some("0xa1")),
                step_event("burn", "success", Some("0xb2")),
                step_event("fetchAttestation", "success", None),
                step_event("mint", "success", Some("0xc3")),
            ],
        );
        assert_eq!(
            phases,
            vec![
                Phase::Burning,
                Phase::WaitingAttestation,
                Phase::Minting,
                Phase::Completed
            ]
        );
        assert_eq!(
            m.log().texts(),
            vec![
                "USDC Approval Tx: 0xa1",
                "Burning USDC...",
                "Burn Tx: 0xb2",
                "Waiting for attestation...",
                "Attestation retrieved!",
                "Minting USDC...",
                "Mint Tx: 0xc3",
                "Transfer completed successfully.",
            ]
        );
        assert!(m.log().entries().iter().all(|e| e.is_timestamped()));
    }

    #[test]
    fn approval_failure_goes_straight_to_error() {
        let mut m = ProgressStateMachine::new();
        m.handle_event(&step_event("approve", "error", None));
        assert_eq!(m.phase(), Phase::Error);
        assert_eq!(m.log().texts(), vec!["❌ Approval failed"]);
    }

    #[test]
    fn burn_and_mint_failures() {
        let mut m = ProgressStateMachine::new();
        drive(
            &mut m,
            &[
                step_event("approve", "success", Some("0xa")),
                step_event("burn", "error", None),
            ],
        );
        assert_eq!(m.phase(), Phase::Error);
        assert_eq!(m.log().texts().last(), Some(&"❌ Burn failed"));

        let mut m = ProgressStateMachine::new();
        drive(
            &mut m,
            &[
                step_event("approve", "success", Some("0xa")),
                step_event("burn", "success", Some("0xb")),
                step_event("fetchAttestation", "success", None),
                step_event("mint", "error", None),
            ],
        );
        assert_eq!(m.phase(), Phase::Error);
        assert_eq!(m.log().texts().last(), Some(&"❌ Mint failed"));
    }

    #[test]
    fn error_wins_even_after_completion() {
        let mut m = ProgressStateMachine::new();
        m.handle_event(&step_event("mint", "success", Some("0xm")));
        assert_eq!(m.phase(), Phase::Completed);
        m.handle_event(&step_event("burn", "error", None));
        assert_eq!(m.phase(), Phase::Error);
    }

    #[test]
    fn attestation_pending_reenters_idempotently() {
        let mut m = ProgressStateMachine::new();
        drive(
            &mut m,
            &[
                step_event("approve", "success", Some("0xa")),
                step_event("burn", "success", Some("0xb")),
                step_event("fetchAttestation", "pending", None),
                step_event("fetchAttestation", "pending", None),
            ],
        );
        assert_eq!(m.phase(), Phase::WaitingAttestation);
        let waits = m
            .log()
            .texts()
            .iter()
            .filter(|t| **t == "Waiting for attestation...")
            .count();
        assert_eq!(waits, 3);
    }

    #[test]
    fn noop_events_change_nothing() {
        let mut m = ProgressStateMachine::new();
        m.handle_event(&step_event("approve", "success", Some("0xa")));
        let before_phase = m.phase();
        let before_log = m.log().lines();

        for raw in [
            json!({}),
            json!({ "method": "swap", "values": { "state": "success" } }),
            json!({ "method": "burn", "values": { "state": 1 } }),
            json!("garbage"),
        ] {
            assert_eq!(m.handle_event(&BridgeEvent::new(raw)), None);
        }
        assert_eq!(m.phase(), before_phase);
        assert_eq!(m.log().lines(), before_log);
    }

    #[test]
    fn stale_backward_event_is_ignored() {
        let mut m = ProgressStateMachine::new();
        drive(
            &mut m,
            &[
                step_event("approve", "success", Some("0xa")),
                step_event("burn", "success", Some("0xb")),
                step_event("fetchAttestation", "success", None),
            ],
        );
        let logged = m.log().entries().len();
        m.handle_event(&step_event("approve", "success", Some("0xlate")));
        m.handle_event(&step_event("fetchAttestation", "pending", None));
        assert_eq!(m.phase(), Phase::Minting);
        assert_eq!(m.log().entries().len(), logged);
    }

    #[test]
    fn pending_steps_advance_silently() {
        let mut m = ProgressStateMachine::new();
        m.handle_event(&step_event("approve", "pending", None));
        assert_eq!(m.phase(), Phase::Approving);
        m.handle_event(&step_event("burn", "pending", None));
        assert_eq!(m.phase(), Phase::Burning);
        assert!(m.log().entries().is_empty());
    }

    #[test]
    fn mint_pending_requests_network_switch_for_evm_destination() {
        let mut m = ProgressStateMachine::new();
        m.begin(Some(84532));
        let effect = m.handle_event(&step_event("mint", "pending", None));
        assert_eq!(effect, Some(Effect::SwitchNetwork { chain_id: 84532 }));
        assert_eq!(m.phase(), Phase::Minting);

        let mut m = ProgressStateMachine::new();
        m.begin(None);
        assert_eq!(m.handle_event(&step_event("mint", "pending", None)), None);
    }

    #[test]
    fn retry_success_reenters_from_error() {
        let mut m = ProgressStateMachine::new();
        m.handle_event(&step_event("mint", "error", None));
        assert_eq!(m.phase(), Phase::Error);
        m.handle_event(&step_event("mint", "success", Some("0xretry")));
        assert_eq!(m.phase(), Phase::Completed);
        assert_eq!(
            m.log().texts(),
            vec![
                "❌ Mint failed",
                "Mint Tx: 0xretry",
                "Transfer completed successfully."
            ]
        );
    }

    #[test]
    fn reset_always_returns_to_idle_with_empty_log() {
        let mut m = ProgressStateMachine::new();
        m.reset();
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.log().entries().is_empty());

        m.handle_event(&step_event("approve", "success", Some("0xa")));
        m.add_log("Estimate: 1 USDC", false);
        m.reset();
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.log().entries().is_empty());

        m.handle_event(&step_event("approve", "error", None));
        m.reset();
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.log().entries().is_empty());
    }

    #[test]
    fn superseded_attempt_events_are_dropped() {
        let mut m = ProgressStateMachine::new();
        let old = m.begin(None);
        m.handle_event_for(old, &step_event("approve", "success", Some("0xa")));
        assert_eq!(m.phase(), Phase::Burning);

        m.reset();
        m.handle_event_for(old, &step_event("burn", "success", Some("0xb")));
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.log().entries().is_empty());

        let current = m.begin(None);
        assert_ne!(old, current);
        m.handle_event_for(current, &step_event("approve", "success", Some("0xc")));
        assert_eq!(m.phase(), Phase::Burning);
    }

    #[test]
    fn add_log_respects_timestamp_flag() {
        let mut m = ProgressStateMachine::new();
        m.add_log("Gas Fees:", false);
        m.add_log("Error: boom", true);
        assert_eq!(m.log().lines()[0], "Gas Fees:");
        assert!(!m.log().entries()[0].is_timestamped());
        assert!(m.log().entries()[1].is_timestamped());
    }

    #[test]
    fn superseded_attempt_cannot_write_log_lines() {
        let mut m = ProgressStateMachine::new();
        let old = m.begin(None);
        assert!(m.add_log_for(old, "Error: boom", true));
        assert!(m.is_current(old));

        m.reset();
        assert!(!m.is_current(old));
        assert!(!m.add_log_for(old, "Transfer completed successfully after retry", true));
        assert!(m.log().entries().is_empty());
    }
}
