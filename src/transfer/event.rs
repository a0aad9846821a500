//! Turns raw engine events into something the progress machine can match on.
//!
//! The engine's events are loosely typed. [`normalize`] is total: anything it
//! cannot classify becomes [`NormalizedEvent::NoOp`].

use std::fmt;

use crate::engine::BridgeEvent;

/// Engine steps that drive progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Approve,
    Burn,
    FetchAttestation,
    Mint,
}

impl Method {
    /// Parses the engine's method / step name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "approve" => Some(Method::Approve),
            "burn" => Some(Method::Burn),
            "fetchAttestation" => Some(Method::FetchAttestation),
            "mint" => Some(Method::Mint),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Approve => "approve",
            Method::Burn => "burn",
            Method::FetchAttestation => "fetchAttestation",
            Method::Mint => "mint",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Success,
    Error,
}

/// A classified engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    NoOp,
    Step {
        method: Method,
        outcome: Outcome,
        /// Only carried on `Success` of approve, burn and mint.
        tx_hash: Option<String>,
    },
}

impl NormalizedEvent {
    fn step(method: Method, outcome: Outcome, tx_hash: Option<String>) -> Self {
        NormalizedEvent::Step {
            method,
            outcome,
            tx_hash,
        }
    }
}

pub fn normalize(event: &BridgeEvent) -> NormalizedEvent {
    let Some(method) = event.method().and_then(Method::from_name) else {
        return NormalizedEvent::NoOp;
    };
    let state = event.value_str("state");

    // The engine never reports an attestation error; anything short of success is still waiting.
    if method == Method::FetchAttestation {
        let outcome = match state {
            Some("success") => Outcome::Success,
            _ => Outcome::Pending,
        };
        return NormalizedEvent::step(method, outcome, None);
    }

    match state {
        Some("pending") => NormalizedEvent::step(method, Outcome::Pending, None),
        Some("success") => {
            let tx_hash = event.value_str("txHash").map(str::to_string);
            NormalizedEvent::step(method, Outcome::Success, tx_hash)
        }
        Some("error") => NormalizedEvent::step(method, Outcome::Error, None),
        _ => NormalizedEvent::NoOp,
    }
}
