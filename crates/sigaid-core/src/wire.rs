//! Wire protocol bodies for the Authority HTTP/JSON API.
//!
//! Shared between the axum server (`sigaid-authority`) and the reqwest
//! client (`sigaid-client`) so the two can never drift. All timestamps are
//! RFC 3339 UTC; hashes and signatures are Base64 except the lease-request
//! nonce and signature, which are hex per the contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::chain::ChainHead;
use crate::entry::StateEntry;
use crate::proof::ProofBundle;

/// `POST /v1/agents` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent_id: String,
    pub public_key_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Reputation counters served with an agent record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Reputation {
    pub successful_verifications: u64,
    pub failed_verifications: u64,
    pub chain_length: u64,
}

impl Reputation {
    /// Score in [0, 1]; agents with no history score 0.5.
    pub fn score(&self) -> f64 {
        let total = self.successful_verifications + self.failed_verifications;
        if total == 0 {
            return 0.5;
        }
        self.successful_verifications as f64 / total as f64
    }
}

/// `GET /v1/agents/{agent_id}` response (and registration echo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub public_key_base64: String,
    #[serde(with = "canonical::ts")]
    pub registered_at: DateTime<Utc>,
    pub reputation: Reputation,
}

/// `POST /v1/leases` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireLeaseRequest {
    pub agent_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub nonce_hex: String,
    pub ttl_seconds: u64,
    pub signature_hex: String,
}

/// Successful lease grant (acquire and renew).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseGrant {
    pub lease_token: String,
    #[serde(with = "canonical::ts")]
    pub acquired_at: DateTime<Utc>,
    #[serde(with = "canonical::ts")]
    pub expires_at: DateTime<Utc>,
    pub sequence: u64,
}

/// `PUT /v1/leases/{agent_id}` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLeaseRequest {
    pub session_id: String,
    pub current_token: String,
    pub ttl_seconds: u64,
}

/// `DELETE /v1/leases/{agent_id}` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseLeaseRequest {
    pub session_id: String,
    pub token: String,
}

/// `GET /v1/leases/{agent_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseStatus {
    pub held: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// `GET /v1/state/{agent_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHeadResponse {
    pub sequence: i64,
    pub entry_hash_base64: String,
}

impl StateHeadResponse {
    pub fn from_head(head: &ChainHead) -> Self {
        Self {
            sequence: head.sequence,
            entry_hash_base64: canonical::b64_encode(head.entry_hash.as_bytes()),
        }
    }

    pub fn to_head(&self) -> Result<ChainHead, crate::error::CoreError> {
        let bytes = canonical::b64_decode(&self.entry_hash_base64)
            .map_err(|e| crate::error::CoreError::MalformedEntry(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::error::CoreError::MalformedEntry("bad head hash length".into()))?;
        Ok(ChainHead {
            sequence: self.sequence,
            entry_hash: crate::crypto::Blake3Hash::from_bytes(arr),
        })
    }
}

/// `GET /v1/state/{agent_id}/history` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHistoryResponse {
    pub entries: Vec<StateEntry>,
    pub total: u64,
}

/// `POST /v1/verify` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub proof: ProofBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_lease: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reputation_score: Option<f64>,
}

/// `POST /v1/verify` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

/// Error body used on every non-2xx response.
///
/// The `error` field is a stable machine-readable code; the optional
/// fields carry structured detail for specific codes (`lease_held`
/// carries the holder, `fork` carries the current head,
/// `sequence_mismatch` carries the expected sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_head: Option<StateHeadResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_sequence: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            holder_session_id: None,
            expires_at: None,
            current_head: None,
            expected_sequence: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Blake3Hash;

    #[test]
    fn test_head_response_roundtrip() {
        let head = ChainHead {
            sequence: 4,
            entry_hash: Blake3Hash::hash(b"head"),
        };
        let resp = StateHeadResponse::from_head(&head);
        assert_eq!(resp.to_head().unwrap(), head);
    }

    #[test]
    fn test_genesis_head_response() {
        let resp = StateHeadResponse::from_head(&ChainHead::GENESIS);
        assert_eq!(resp.sequence, -1);
        let back = resp.to_head().unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_reputation_score() {
        let fresh = Reputation::default();
        assert_eq!(fresh.score(), 0.5);

        let seasoned = Reputation {
            successful_verifications: 9,
            failed_verifications: 1,
            chain_length: 40,
        };
        assert!((seasoned.score() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_error_response_serde() {
        let err = ErrorResponse::new("lease_held").with_message("held by sid_abc");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("lease_held"));
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error, "lease_held");
    }
}
