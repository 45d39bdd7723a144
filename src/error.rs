//! Typed error taxonomy for the resolution engine.
//!
//! Every collaborator failure is converted into one of these types at the
//! component boundary; no transport error crosses into orchestration code.

use std::time::Duration;
use thiserror::Error;

/// Failures talking to an external collaborator (extraction, directory,
/// availability, calendar, contacts).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("unparsable response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured duration here
            ServiceError::Timeout(Duration::ZERO)
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Errors surfaced by the engine's boundary operations.
///
/// Draft-level conditions (missing participants, missing time, ambiguity)
/// are not errors: they live as warnings or states on the draft itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Update/cancel could not locate a single target event. Fatal for that
    /// operation; the caller's draft is preserved for correction.
    #[error("no matching event found")]
    EventNotFound,

    /// The downstream create/update/delete call failed. Carries the upstream
    /// status and body so the caller can decide whether to retry manually.
    #[error("calendar mutation failed with status {status}: {body}")]
    CommitFailure { status: u16, body: String },

    /// A participant still needs disambiguation; committing would guess.
    #[error("participant '{0}' is ambiguous and must be resolved before commit")]
    AmbiguousParticipant(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl EngineError {
    /// Fold a calendar-service failure into the commit taxonomy: an upstream
    /// HTTP status becomes a `CommitFailure`, anything else stays a
    /// transport-level `Service` error.
    pub fn from_commit(e: ServiceError) -> Self {
        match e {
            ServiceError::Status { status, body } => EngineError::CommitFailure { status, body },
            other => EngineError::Service(other),
        }
    }
}
