//! Proof bundles: the compact object a service challenges for, and the
//! offline half of the verification algorithm.
//!
//! Online (Authority-corroborated) verification lives with the parties
//! that can reach the Authority; everything here is pure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_id::AgentId;
use crate::canonical;
use crate::chain::ChainHead;
use crate::crypto::{Blake3Hash, Ed25519Signature, Keypair, SignDomain};
use crate::entry::StateEntry;
use crate::error::CoreError;
use crate::token::CLOCK_SKEW;

/// A verifier-supplied challenge, 16 to 256 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(Vec<u8>);

impl Challenge {
    pub const MIN_LEN: usize = 16;
    pub const MAX_LEN: usize = 256;

    /// Wrap challenge bytes, enforcing the length bounds.
    pub fn new(bytes: Vec<u8>) -> Result<Self, CoreError> {
        if bytes.len() < Self::MIN_LEN || bytes.len() > Self::MAX_LEN {
            return Err(CoreError::ChallengeLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Generate a fresh random challenge of the given length.
    pub fn random(len: usize) -> Result<Self, CoreError> {
        use rand::RngCore;
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(CoreError::ChallengeLength(len));
        }
        let mut bytes = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Why a bundle failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    BadAgentId,
    BadSignature,
    ChallengeMismatch,
    StaleBundle,
    NoActiveLease,
    StateHeadMismatch,
    AuthorityUnavailable,
}

impl ReasonCode {
    /// Parse the wire form.
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "bad_agent_id" => ReasonCode::BadAgentId,
            "bad_signature" => ReasonCode::BadSignature,
            "challenge_mismatch" => ReasonCode::ChallengeMismatch,
            "stale_bundle" => ReasonCode::StaleBundle,
            "no_active_lease" => ReasonCode::NoActiveLease,
            "state_head_mismatch" => ReasonCode::StateHeadMismatch,
            "authority_unavailable" => ReasonCode::AuthorityUnavailable,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::BadAgentId => "bad_agent_id",
            ReasonCode::BadSignature => "bad_signature",
            ReasonCode::ChallengeMismatch => "challenge_mismatch",
            ReasonCode::StaleBundle => "stale_bundle",
            ReasonCode::NoActiveLease => "no_active_lease",
            ReasonCode::StateHeadMismatch => "state_head_mismatch",
            ReasonCode::AuthorityUnavailable => "authority_unavailable",
        }
    }
}

/// The outcome of verifying a bundle.
///
/// `ValidOffline` means the cryptographic checks passed but no Authority
/// corroborated the lease or head; callers must weigh it accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    ValidOffline,
    Invalid(ReasonCode),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid | Self::ValidOffline)
    }
}

/// Verification policy supplied by the relying service.
#[derive(Debug, Clone, Default)]
pub struct VerifyPolicy {
    /// Require an Authority-corroborated active lease.
    pub require_lease: bool,

    /// Maximum acceptable age of the state head.
    pub max_state_age: Option<Duration>,

    /// Minimum reputation score (checked online only).
    pub min_reputation: Option<f64>,
}

/// The proof bundle an agent hands to a challenging service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub agent_id: AgentId,

    /// Current lease token, opaque to everyone but the Authority.
    pub lease_token: String,

    /// The agent's latest state entry; `None` for a chain-less agent.
    pub state_head: Option<StateEntry>,

    /// The challenge exactly as received.
    #[serde(with = "canonical::b64")]
    pub challenge: Vec<u8>,

    /// Signature over the challenge under `agent.challenge.v1`.
    pub challenge_signature: Ed25519Signature,

    #[serde(with = "canonical::ts")]
    pub bundle_timestamp: DateTime<Utc>,

    /// Signature over the preceding fields under `agent.proof.v1`.
    pub bundle_signature: Ed25519Signature,
}

impl ProofBundle {
    /// The hash committing this bundle to its state head.
    pub fn state_head_hash(&self) -> Blake3Hash {
        self.state_head
            .as_ref()
            .map(|e| e.entry_hash)
            .unwrap_or(Blake3Hash::ZERO)
    }

    fn signable_bytes(&self) -> Vec<u8> {
        canonical::bundle_signable_bytes(
            self.agent_id.as_str(),
            &self.lease_token,
            &self.state_head_hash(),
            &self.challenge,
            &self.challenge_signature,
            self.bundle_timestamp,
        )
    }

    /// Offline verification: steps 1, 2, and 4 of the protocol.
    ///
    /// 1. `agent_id` parses and yields the public key (already guaranteed
    ///    by the `AgentId` type for locally constructed bundles; bundles
    ///    deserialized from untrusted bytes re-validate in serde).
    /// 2. Both signatures verify and the challenge matches what the
    ///    service issued.
    /// 4. The state head is self-consistent.
    ///
    /// A `cached_head` from a previous encounter, when supplied, must not
    /// be ahead of the bundle's head and must agree on equal sequence.
    pub fn verify_offline(
        &self,
        expected_challenge: &Challenge,
        policy: &VerifyPolicy,
        now: DateTime<Utc>,
        cached_head: Option<&ChainHead>,
    ) -> VerificationOutcome {
        let public_key = self.agent_id.public_key();
        if !public_key.validate() {
            return VerificationOutcome::Invalid(ReasonCode::BadAgentId);
        }

        if self.challenge != expected_challenge.as_bytes() {
            return VerificationOutcome::Invalid(ReasonCode::ChallengeMismatch);
        }

        if !public_key.verify(
            SignDomain::Challenge,
            &self.challenge,
            &self.challenge_signature,
        ) {
            return VerificationOutcome::Invalid(ReasonCode::BadSignature);
        }

        if !public_key.verify(
            SignDomain::Proof,
            &self.signable_bytes(),
            &self.bundle_signature,
        ) {
            return VerificationOutcome::Invalid(ReasonCode::BadSignature);
        }

        if (now - self.bundle_timestamp).abs() > CLOCK_SKEW {
            return VerificationOutcome::Invalid(ReasonCode::StaleBundle);
        }

        if let Some(head) = &self.state_head {
            if head.agent_id != self.agent_id
                || !head.verify_hash()
                || !head.verify_signature(&public_key)
            {
                return VerificationOutcome::Invalid(ReasonCode::StateHeadMismatch);
            }

            if let Some(max_age) = policy.max_state_age {
                if now - head.timestamp > max_age {
                    return VerificationOutcome::Invalid(ReasonCode::StateHeadMismatch);
                }
            }
        }

        if let Some(cached) = cached_head {
            let bundle_seq = self.state_head.as_ref().map(|e| e.sequence as i64).unwrap_or(-1);
            if bundle_seq < cached.sequence {
                return VerificationOutcome::Invalid(ReasonCode::StateHeadMismatch);
            }
            if bundle_seq == cached.sequence && self.state_head_hash() != cached.entry_hash {
                return VerificationOutcome::Invalid(ReasonCode::StateHeadMismatch);
            }
        }

        VerificationOutcome::ValidOffline
    }
}

/// Builds signed proof bundles for an agent.
pub struct ProofBundleBuilder<'a> {
    keypair: &'a Keypair,
    lease_token: String,
    state_head: Option<StateEntry>,
}

impl<'a> ProofBundleBuilder<'a> {
    pub fn new(keypair: &'a Keypair, lease_token: String, state_head: Option<StateEntry>) -> Self {
        Self {
            keypair,
            lease_token,
            state_head,
        }
    }

    /// Sign the challenge and the full bundle.
    pub fn build(&self, challenge: &Challenge, now: DateTime<Utc>) -> ProofBundle {
        let agent_id = self.keypair.agent_id();
        let challenge_signature = self
            .keypair
            .sign(SignDomain::Challenge, challenge.as_bytes());

        let head_hash = self
            .state_head
            .as_ref()
            .map(|e| e.entry_hash)
            .unwrap_or(Blake3Hash::ZERO);

        let signable = canonical::bundle_signable_bytes(
            agent_id.as_str(),
            &self.lease_token,
            &head_hash,
            challenge.as_bytes(),
            &challenge_signature,
            now,
        );
        let bundle_signature = self.keypair.sign(SignDomain::Proof, &signable);

        ProofBundle {
            agent_id,
            lease_token: self.lease_token.clone(),
            state_head: self.state_head.clone(),
            challenge: challenge.as_bytes().to_vec(),
            challenge_signature,
            bundle_timestamp: now,
            bundle_signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ActionType, StateEntryBuilder};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap()
    }

    fn make_bundle(keypair: &Keypair, challenge: &Challenge) -> ProofBundle {
        let builder = StateEntryBuilder::new(keypair.agent_id(), keypair);
        let head = builder
            .build(None, ActionType::TaskStart, "start", b"", fixed_now())
            .unwrap();
        ProofBundleBuilder::new(keypair, "v4.local.token".into(), Some(head))
            .build(challenge, fixed_now())
    }

    #[test]
    fn test_challenge_bounds() {
        assert!(Challenge::new(vec![0u8; 15]).is_err());
        assert!(Challenge::new(vec![0u8; 16]).is_ok());
        assert!(Challenge::new(vec![0u8; 256]).is_ok());
        assert!(Challenge::new(vec![0u8; 257]).is_err());
    }

    #[test]
    fn test_offline_verify_accepts() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        let outcome =
            bundle.verify_offline(&challenge, &VerifyPolicy::default(), fixed_now(), None);
        assert_eq!(outcome, VerificationOutcome::ValidOffline);
    }

    #[test]
    fn test_challenge_mismatch() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let other = Challenge::new(vec![0xbb; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        let outcome = bundle.verify_offline(&other, &VerifyPolicy::default(), fixed_now(), None);
        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(ReasonCode::ChallengeMismatch)
        );
    }

    #[test]
    fn test_tampered_challenge_signature() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let mut bundle = make_bundle(&keypair, &challenge);
        bundle.challenge_signature.0[0] ^= 0x01;

        let outcome =
            bundle.verify_offline(&challenge, &VerifyPolicy::default(), fixed_now(), None);
        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(ReasonCode::BadSignature)
        );
    }

    #[test]
    fn test_tampered_token_breaks_bundle_signature() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let mut bundle = make_bundle(&keypair, &challenge);
        bundle.lease_token.push('x');

        let outcome =
            bundle.verify_offline(&challenge, &VerifyPolicy::default(), fixed_now(), None);
        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(ReasonCode::BadSignature)
        );
    }

    #[test]
    fn test_stale_bundle() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        let later = fixed_now() + Duration::seconds(121);
        let outcome = bundle.verify_offline(&challenge, &VerifyPolicy::default(), later, None);
        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(ReasonCode::StaleBundle)
        );
    }

    #[test]
    fn test_cached_head_ahead_rejected() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        // Cache claims the chain is already at sequence 5.
        let cached = ChainHead {
            sequence: 5,
            entry_hash: Blake3Hash::from_bytes([0x22; 32]),
        };
        let outcome = bundle.verify_offline(
            &challenge,
            &VerifyPolicy::default(),
            fixed_now(),
            Some(&cached),
        );
        assert_eq!(
            outcome,
            VerificationOutcome::Invalid(ReasonCode::StateHeadMismatch)
        );
    }

    #[test]
    fn test_cached_head_agrees() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        let cached = ChainHead::of(bundle.state_head.as_ref().unwrap());
        let outcome = bundle.verify_offline(
            &challenge,
            &VerifyPolicy::default(),
            fixed_now(),
            Some(&cached),
        );
        assert_eq!(outcome, VerificationOutcome::ValidOffline);
    }

    #[test]
    fn test_bundle_serde_roundtrip() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let challenge = Challenge::new(vec![0xaa; 32]).unwrap();
        let bundle = make_bundle(&keypair, &challenge);

        let json = serde_json::to_string(&bundle).unwrap();
        let back: ProofBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle, back);
        assert_eq!(
            back.verify_offline(&challenge, &VerifyPolicy::default(), fixed_now(), None),
            VerificationOutcome::ValidOffline
        );
    }
}
