//! Error types for authority operations.

use thiserror::Error;

use sigaid_core::ChainHead;

use crate::store::StoreError;

/// Failures surfaced by authority operations. Each maps to a stable wire
/// code and HTTP status in the `http` module.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("agent not registered: {0}")]
    AgentNotFound(String),

    #[error("agent already registered: {0}")]
    AgentExists(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("request timestamp outside clock skew window")]
    ClockSkew,

    #[error("nonce replayed")]
    NonceReplayed,

    #[error("lease held by {holder_session_id}")]
    LeaseHeld {
        holder_session_id: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("session mismatch")]
    SessionMismatch,

    #[error("lease expired")]
    LeaseExpired,

    #[error("no active lease")]
    NoActiveLease,

    #[error("token invalid")]
    TokenInvalid,

    #[error("fork detected at head {}", current_head.sequence)]
    Fork { current_head: ChainHead },

    #[error("sequence mismatch: expected {expected}")]
    SequenceMismatch { expected: u64 },

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error(transparent)]
    Store(#[from] StoreError),
}
