use thiserror::Error;

use crate::domain::crm::CrmActionStatus;
use crate::domain::session::CallId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid crm action transition from {from:?} to {to:?}")]
    InvalidActionTransition { from: CrmActionStatus, to: CrmActionStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure of a consumed external capability. These never abort a call; the
/// turn that hit one degrades to a spoken fallback.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("crm request failed: {0}")]
    Crm(String),
    #[error("availability lookup failed: {0}")]
    Availability(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

/// Any error raised while handling one turn. Caught once at the router
/// boundary and converted to a fixed apology so the caller always hears a
/// reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("no session found for call {0}")]
    SessionMissing(CallId),
}

impl TurnError {
    /// Caller-safe spoken fallback for an internal failure.
    pub fn spoken_fallback(&self) -> &'static str {
        "I'm sorry, I had trouble with that. Could you say it again?"
    }
}
