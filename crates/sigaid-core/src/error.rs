//! Error types for the SigAid core.

use thiserror::Error;

/// An opaque cryptographic failure.
///
/// Signature verification, AEAD opens, and CSPRNG failures all collapse
/// into this one error. Callers never learn *why* a cryptographic check
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cryptographic operation failed")]
pub struct CryptoError;

/// Errors for malformed inputs to core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid agent id: {0}")]
    InvalidAgentId(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("challenge length {0} outside 16..=256")]
    ChallengeLength(usize),

    #[error("action summary exceeds {max} bytes", max = crate::entry::MAX_SUMMARY_BYTES)]
    SummaryTooLong(usize),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
