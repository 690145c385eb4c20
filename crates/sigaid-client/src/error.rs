//! Client-side error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use sigaid_core::{ChainHead, CoreError};

/// Failures surfaced to agent code.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Another instance of this identity holds the lease. Surfaced once,
    /// never silently retried.
    #[error("lease held by another instance (session {holder_session_id})")]
    LeaseHeldByAnother {
        holder_session_id: String,
        expires_at: Option<DateTime<Utc>>,
    },

    #[error("no active lease")]
    NoActiveLease,

    #[error("session mismatch")]
    SessionMismatch,

    #[error("lease expired")]
    LeaseExpired,

    /// Renewal gave up past the safety margin; the lease must be treated
    /// as gone.
    #[error("lease lost: {0}")]
    LeaseLost(String),

    /// The Authority rejected an append as a fork. Fatal for this agent
    /// identity until manual intervention.
    #[error("state chain fork at committed head {}", current_head.sequence)]
    Fork { current_head: ChainHead },

    #[error("sequence mismatch: expected {expected:?}")]
    SequenceMismatch { expected: Option<u64> },

    #[error("agent not registered")]
    AgentNotFound,

    #[error("agent already registered")]
    AgentExists,

    #[error("permission denied")]
    PermissionDenied,

    #[error("signature rejected by authority")]
    InvalidSignature,

    /// Retries exhausted against an unreachable or failing Authority.
    #[error("authority unavailable: {0}")]
    AuthorityUnavailable(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A previous fork poisoned this chain handle.
    #[error("chain handle poisoned by an earlier fork")]
    ChainPoisoned,

    #[error("unexpected authority response: {status} {code}")]
    UnexpectedResponse { status: u16, code: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ClientError {
    /// Errors that backoff-and-retry may mask. Everything else surfaces
    /// immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::AuthorityUnavailable(_))
    }
}
