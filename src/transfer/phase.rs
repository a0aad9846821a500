use std::fmt;

use serde::{Deserialize, Serialize};

/// User-facing stage of a transfer.
///
/// Forward order: idle → approving → burning → waiting-attestation → minting → completed.
/// `error` can be entered from anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    Approving,
    Burning,
    WaitingAttestation,
    Minting,
    Completed,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Error)
    }

    /// Position along the forward order. `Error` sits outside it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Phase::Idle => Some(0),
            Phase::Approving => Some(1),
            Phase::Burning => Some(2),
            Phase::WaitingAttestation => Some(3),
            Phase::Minting => Some(4),
            Phase::Completed => Some(5),
            Phase::Error => None,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Errors always win. Leaving `error` is a retry re-entering the sequence.
    /// Otherwise phases only move forward or stay put.
    pub fn admits(&self, next: Phase) -> bool {
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (None, Some(_)) => true,
            (Some(current), Some(target)) => target >= current,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Approving => "approving",
            Phase::Burning => "burning",
            Phase::WaitingAttestation => "waiting-attestation",
            Phase::Minting => "minting",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
