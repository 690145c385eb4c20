//! Proof construction for the agent side.

use chrono::Utc;

use sigaid_core::{Challenge, Keypair, ProofBundle, ProofBundleBuilder, StateEntry};

/// Builds proof bundles for an agent identity.
pub struct Prover {
    keypair: Keypair,
}

impl Prover {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Answer a challenge with the current lease token and state head.
    pub fn create_proof(
        &self,
        lease_token: String,
        state_head: Option<StateEntry>,
        challenge: &Challenge,
    ) -> ProofBundle {
        ProofBundleBuilder::new(&self.keypair, lease_token, state_head)
            .build(challenge, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigaid_core::{VerificationOutcome, VerifyPolicy};

    #[test]
    fn test_proof_self_verifies() {
        let keypair = Keypair::from_seed(&[0x61; 32]);
        let prover = Prover::new(keypair.clone());
        let challenge = Challenge::new(vec![0x42; 32]).unwrap();

        let bundle = prover.create_proof("v4.local.x".into(), None, &challenge);
        let outcome = bundle.verify_offline(
            &challenge,
            &VerifyPolicy::default(),
            chrono::Utc::now(),
            None,
        );
        assert_eq!(outcome, VerificationOutcome::ValidOffline);
    }
}
