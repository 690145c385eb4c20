//! StateEntry: one immutable, signed, hash-linked entry in an agent's
//! state chain.
//!
//! Once signed an entry never changes. The chain grows by appending new
//! entries whose `prev_hash` commits to the previous `entry_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::agent_id::AgentId;
use crate::canonical;
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair, SignDomain};
use crate::error::CoreError;

/// Maximum UTF-8 length of an action summary.
pub const MAX_SUMMARY_BYTES: usize = 256;

/// The kind of action recorded in a state entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// External transaction (payment, booking, ...).
    Transaction,
    /// Third-party attestation.
    Attestation,
    /// Agent upgrade or migration.
    Upgrade,
    /// State reset with Authority approval.
    Reset,
    /// Tool or function invocation.
    ToolCall,
    /// LLM API call.
    LlmRequest,
    /// Agent decision point.
    Decision,
    /// Task started.
    TaskStart,
    /// Task completed.
    TaskComplete,
    /// Error occurred.
    Error,
    /// Application-defined action type.
    Custom(String),
}

impl ActionType {
    /// The stable string form used in canonical bytes and on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Transaction => "transaction",
            ActionType::Attestation => "attestation",
            ActionType::Upgrade => "upgrade",
            ActionType::Reset => "reset",
            ActionType::ToolCall => "tool_call",
            ActionType::LlmRequest => "llm_request",
            ActionType::Decision => "decision",
            ActionType::TaskStart => "task_start",
            ActionType::TaskComplete => "task_complete",
            ActionType::Error => "error",
            ActionType::Custom(s) => s,
        }
    }

    /// Parse from the stable string form. Unknown strings become `Custom`.
    pub fn from_name(s: &str) -> Self {
        match s {
            "transaction" => ActionType::Transaction,
            "attestation" => ActionType::Attestation,
            "upgrade" => ActionType::Upgrade,
            "reset" => ActionType::Reset,
            "tool_call" => ActionType::ToolCall,
            "llm_request" => ActionType::LlmRequest,
            "decision" => ActionType::Decision,
            "task_start" => ActionType::TaskStart,
            "task_complete" => ActionType::TaskComplete,
            "error" => ActionType::Error,
            other => ActionType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ActionType::from_name(&s))
    }
}

/// An immutable state chain entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// The owning agent.
    pub agent_id: AgentId,

    /// 0-based sequence number within the chain.
    pub sequence: u64,

    /// `entry_hash` of the previous entry; all zeros at sequence 0.
    pub prev_hash: Blake3Hash,

    /// Author-claimed timestamp.
    #[serde(with = "canonical::ts")]
    pub timestamp: DateTime<Utc>,

    /// Kind of action recorded.
    pub action_type: ActionType,

    /// Human-readable summary, at most 256 UTF-8 bytes.
    pub action_summary: String,

    /// Blake3 of the caller's payload. The payload itself never enters
    /// the chain.
    pub action_data_hash: Blake3Hash,

    /// Ed25519 signature under `agent.state.v1` over the entry minus
    /// `signature` and `entry_hash`.
    pub signature: Ed25519Signature,

    /// Blake3 over the signable bytes plus the signature.
    pub entry_hash: Blake3Hash,
}

impl StateEntry {
    /// The canonical signable bytes: every field except `signature` and
    /// `entry_hash`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        canonical::entry_signable_bytes(
            self.agent_id.as_str(),
            self.sequence,
            &self.prev_hash,
            self.timestamp,
            self.action_type.as_str(),
            &self.action_summary,
            &self.action_data_hash,
        )
    }

    /// Recompute what `entry_hash` must be for this entry's contents.
    pub fn compute_hash(&self) -> Blake3Hash {
        let mut bytes = self.signable_bytes();
        bytes.extend_from_slice(self.signature.as_bytes());
        Blake3Hash::hash(&bytes)
    }

    /// Check that `entry_hash` matches the entry's contents.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.entry_hash
    }

    /// Verify the entry signature under `agent.state.v1`.
    pub fn verify_signature(&self, public_key: &Ed25519PublicKey) -> bool {
        public_key.verify(SignDomain::State, &self.signable_bytes(), &self.signature)
    }

    /// True for the first entry of a chain.
    pub fn is_genesis(&self) -> bool {
        self.sequence == 0 && self.prev_hash == Blake3Hash::ZERO
    }
}

/// Builds and signs state entries for one agent.
pub struct StateEntryBuilder<'a> {
    agent_id: AgentId,
    keypair: &'a Keypair,
}

impl<'a> StateEntryBuilder<'a> {
    pub fn new(agent_id: AgentId, keypair: &'a Keypair) -> Self {
        Self { agent_id, keypair }
    }

    /// Build, sign, and hash the next entry.
    ///
    /// `prev` is `None` for a fresh chain (sequence 0, zero prev hash).
    /// `payload` is hashed; it is never stored or transmitted.
    pub fn build(
        &self,
        prev: Option<&StateEntry>,
        action_type: ActionType,
        action_summary: &str,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<StateEntry, CoreError> {
        let (sequence, prev_hash) = match prev {
            Some(entry) => (entry.sequence + 1, entry.entry_hash),
            None => (0, Blake3Hash::ZERO),
        };
        self.build_at(sequence, prev_hash, action_type, action_summary, payload, timestamp)
    }

    /// Build the entry for an explicit chain position. Used when only the
    /// head `(sequence, hash)` is known rather than the full previous
    /// entry.
    pub fn build_at(
        &self,
        sequence: u64,
        prev_hash: Blake3Hash,
        action_type: ActionType,
        action_summary: &str,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<StateEntry, CoreError> {
        if action_summary.len() > MAX_SUMMARY_BYTES {
            return Err(CoreError::SummaryTooLong(action_summary.len()));
        }

        let action_data_hash = if payload.is_empty() {
            Blake3Hash::ZERO
        } else {
            Blake3Hash::hash(payload)
        };

        let signable = canonical::entry_signable_bytes(
            self.agent_id.as_str(),
            sequence,
            &prev_hash,
            timestamp,
            action_type.as_str(),
            action_summary,
            &action_data_hash,
        );
        let signature = self.keypair.sign(SignDomain::State, &signable);

        let mut hashed = signable;
        hashed.extend_from_slice(signature.as_bytes());
        let entry_hash = Blake3Hash::hash(&hashed);

        Ok(StateEntry {
            agent_id: self.agent_id.clone(),
            sequence,
            prev_hash,
            timestamp,
            action_type,
            action_summary: action_summary.to_string(),
            action_data_hash,
            signature,
            entry_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_keypair() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_genesis_entry() {
        let keypair = test_keypair();
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);

        let entry = builder
            .build(None, ActionType::TaskStart, "booting", b"", test_time())
            .unwrap();

        assert_eq!(entry.sequence, 0);
        assert_eq!(entry.prev_hash, Blake3Hash::ZERO);
        assert!(entry.is_genesis());
        assert!(entry.verify_hash());
        assert!(entry.verify_signature(&keypair.public_key()));
    }

    #[test]
    fn test_linked_entry() {
        let keypair = test_keypair();
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);

        let genesis = builder
            .build(None, ActionType::TaskStart, "start", b"", test_time())
            .unwrap();
        let next = builder
            .build(
                Some(&genesis),
                ActionType::ToolCall,
                "called search",
                b"{\"query\":\"rust\"}",
                test_time(),
            )
            .unwrap();

        assert_eq!(next.sequence, 1);
        assert_eq!(next.prev_hash, genesis.entry_hash);
        assert!(next.verify_hash());
        assert!(next.verify_signature(&keypair.public_key()));
    }

    #[test]
    fn test_tampered_summary_breaks_hash_and_signature() {
        let keypair = test_keypair();
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let mut entry = builder
            .build(None, ActionType::Decision, "approve", b"data", test_time())
            .unwrap();

        entry.action_summary = "reject".to_string();
        assert!(!entry.verify_hash());
        assert!(!entry.verify_signature(&keypair.public_key()));
    }

    #[test]
    fn test_summary_limit_enforced() {
        let keypair = test_keypair();
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let long = "x".repeat(MAX_SUMMARY_BYTES + 1);

        let result = builder.build(None, ActionType::Custom("x".into()), &long, b"", test_time());
        assert!(matches!(result, Err(CoreError::SummaryTooLong(_))));
    }

    #[test]
    fn test_action_type_name_roundtrip() {
        for at in [
            ActionType::Transaction,
            ActionType::Attestation,
            ActionType::Upgrade,
            ActionType::Reset,
            ActionType::ToolCall,
            ActionType::LlmRequest,
            ActionType::Decision,
            ActionType::TaskStart,
            ActionType::TaskComplete,
            ActionType::Error,
            ActionType::Custom("deploy".into()),
        ] {
            assert_eq!(ActionType::from_name(at.as_str()), at);
        }
    }

    #[test]
    fn test_entry_serde_roundtrip() {
        let keypair = test_keypair();
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let entry = builder
            .build(None, ActionType::Transaction, "paid $5", b"receipt", test_time())
            .unwrap();

        let json = serde_json::to_string(&entry).unwrap();
        let back: StateEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
        assert!(back.verify_hash());
    }

    #[test]
    fn test_deterministic_signature_vector() {
        // Pinned: the same seed and inputs must always produce the same
        // signature and entry hash (Ed25519 is deterministic).
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let e1 = builder
            .build(None, ActionType::TaskStart, "hello", b"", test_time())
            .unwrap();
        let e2 = builder
            .build(None, ActionType::TaskStart, "hello", b"", test_time())
            .unwrap();
        assert_eq!(e1.signature, e2.signature);
        assert_eq!(e1.entry_hash, e2.entry_hash);
    }
}
