//! Failures reported by the bridging engine itself, as opposed to a failed step
//! inside an otherwise completed invocation.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused the request (bad params, unsupported route).
    #[error("engine rejected request: {0}")]
    Rejected(String),

    /// The engine could not reach a chain or the attestation service.
    #[error("engine transport failure: {0}")]
    Transport(String),

    /// Nothing scripted or configured for this call.
    #[error("engine has no {0} configured")]
    Unavailable(&'static str),
}
