//! Lease token claims and pure validation.
//!
//! The Authority seals these claims into an authenticated `v4.local`
//! envelope (see `sigaid-authority`); this module owns only the claim set
//! and the time checks, which both sides share.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical;

/// Clock skew tolerated when validating token and bundle timestamps.
pub const CLOCK_SKEW: Duration = Duration::seconds(120);

/// Claims carried inside a lease token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseClaims {
    /// The leased agent identity.
    pub agent_id: String,

    /// Client-chosen session identifier, unique per acquire attempt.
    pub session_id: String,

    /// Issued-at.
    #[serde(with = "canonical::ts")]
    pub iat: DateTime<Utc>,

    /// Expiry.
    #[serde(with = "canonical::ts")]
    pub exp: DateTime<Utc>,

    /// Unique token id.
    pub jti: String,

    /// Monotonic per-session renew counter.
    pub seq: u64,
}

/// Token validation failures. Expiry is the only distinguishable case;
/// everything else is opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,
}

impl LeaseClaims {
    /// Time-validate the claims at `now` with the protocol skew bound.
    pub fn validate_time(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.exp + CLOCK_SKEW < now {
            return Err(TokenError::Expired);
        }
        if self.iat > now + CLOCK_SKEW {
            return Err(TokenError::Invalid);
        }
        Ok(())
    }

    /// Check that the token belongs to the given agent and session.
    pub fn matches(&self, agent_id: &str, session_id: &str) -> bool {
        self.agent_id == agent_id && self.session_id == session_id
    }
}
