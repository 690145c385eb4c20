//! Service-side proof verification.
//!
//! Services embed a [`Verifier`] to challenge agents and check the
//! bundles they return. Online verification corroborates the lease and
//! state head with the Authority; offline verification checks only the
//! cryptography and is flagged as such in the outcome.

use chrono::Utc;
use std::time::{Duration, Instant};

use sigaid_core::wire::VerifyRequest;
use sigaid_core::{
    ChainHead, Challenge, CoreError, ProofBundle, ReasonCode, VerificationOutcome, VerifyPolicy,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::AuthorityClient;

/// Verifies agent proof bundles against a SigAid Authority.
pub struct Verifier {
    http: AuthorityClient,
    call_timeout: Duration,
}

impl Verifier {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: AuthorityClient::new(config),
            call_timeout: config.request_timeout,
        }
    }

    /// Issue a fresh random challenge. Each verification attempt must use
    /// a new one.
    pub fn create_challenge(&self) -> Challenge {
        Challenge::random(32).expect("32 is within challenge bounds")
    }

    /// Offline verification: cryptographic checks only. The result is
    /// `ValidOffline` at best; no lease is corroborated.
    pub fn verify_offline(
        &self,
        proof: &ProofBundle,
        challenge: &Challenge,
        policy: &VerifyPolicy,
        cached_head: Option<&ChainHead>,
    ) -> VerificationOutcome {
        proof.verify_offline(challenge, policy, Utc::now(), cached_head)
    }

    /// Full online verification.
    ///
    /// Runs the offline checks first (the challenge comparison happens
    /// here, against what this service issued), then asks the Authority
    /// to corroborate the token, lease record, and state head. If the
    /// Authority is unreachable and the policy requires a lease, the
    /// outcome is `Invalid(AuthorityUnavailable)` — the check never
    /// silently degrades.
    pub async fn verify(
        &self,
        proof: &ProofBundle,
        challenge: &Challenge,
        policy: &VerifyPolicy,
    ) -> Result<VerificationOutcome, ClientError> {
        match self.verify_offline(proof, challenge, policy, None) {
            VerificationOutcome::Invalid(code) => return Ok(VerificationOutcome::Invalid(code)),
            VerificationOutcome::Valid | VerificationOutcome::ValidOffline => {}
        }

        let request = VerifyRequest {
            proof: proof.clone(),
            require_lease: Some(policy.require_lease),
            min_reputation_score: policy.min_reputation,
        };
        let deadline = Instant::now() + self.call_timeout;

        match self.http.verify(&request, Some(deadline)).await {
            Ok(response) => {
                if response.valid {
                    Ok(VerificationOutcome::Valid)
                } else {
                    let code = response
                        .reason_code
                        .as_deref()
                        .and_then(ReasonCode::from_name)
                        .unwrap_or(ReasonCode::BadSignature);
                    Ok(VerificationOutcome::Invalid(code))
                }
            }
            Err(e) if e.is_transient() => {
                if policy.require_lease {
                    Ok(VerificationOutcome::Invalid(ReasonCode::AuthorityUnavailable))
                } else {
                    // The caller accepted offline-grade assurance.
                    Ok(VerificationOutcome::ValidOffline)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Convenience: parse and verify a serialized bundle.
    pub async fn verify_json(
        &self,
        proof_json: &[u8],
        challenge: &Challenge,
        policy: &VerifyPolicy,
    ) -> Result<VerificationOutcome, ClientError> {
        let proof: ProofBundle = serde_json::from_slice(proof_json)
            .map_err(|e| ClientError::Core(CoreError::MalformedEntry(e.to_string())))?;
        self.verify(&proof, challenge, policy).await
    }
}
