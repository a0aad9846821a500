use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::log::LogEntry;
use super::machine::{Effect, ProgressStateMachine, Ticket};
use super::phase::Phase;
use crate::engine::BridgeEvent;

/// Shared handle to the progress of one session.
///
/// The session drives it from engine events while the presentation layer
/// reads snapshots and may `reset` at any time. Writes that belong to an
/// attempt go through its [`Ticket`] so a reset discards them.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    inner: Arc<Mutex<ProgressStateMachine>>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressStateMachine::new())),
        }
    }

    fn machine(&self) -> MutexGuard<'_, ProgressStateMachine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.machine().phase()
    }

    pub fn lines(&self) -> Vec<String> {
        self.machine().log().lines()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.machine().log().entries().to_vec()
    }

    #[cfg(test)]
    pub fn texts(&self) -> Vec<String> {
        self.machine()
            .log()
            .texts()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn add_log(&self, line: impl Into<String>, timestamped: bool) {
        self.machine().add_log(line, timestamped);
    }

    /// Returns false, writing nothing, if the attempt was superseded.
    pub fn add_log_for(&self, ticket: Ticket, line: impl Into<String>, timestamped: bool) -> bool {
        self.machine().add_log_for(ticket, line, timestamped)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.machine().is_current(ticket)
    }

    pub fn reset(&self) {
        self.machine().reset();
    }

    pub fn begin(&self, switch_target: Option<u64>) -> Ticket {
        self.machine().begin(switch_target)
    }

    pub fn handle_event_for(&self, ticket: Ticket, event: &BridgeEvent) -> Option<Effect> {
        self.machine().handle_event_for(ticket, event)
    }
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}
