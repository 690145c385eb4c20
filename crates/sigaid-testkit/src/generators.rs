//! Proptest strategies for property-based tests.

use proptest::prelude::*;

use sigaid_core::ActionType;

/// Arbitrary 32-byte seeds.
pub fn arb_seed() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>()
}

/// Arbitrary action types, covering the enumerated set and custom names.
pub fn arb_action_type() -> impl Strategy<Value = ActionType> {
    prop_oneof![
        Just(ActionType::Transaction),
        Just(ActionType::Attestation),
        Just(ActionType::Upgrade),
        Just(ActionType::Reset),
        Just(ActionType::ToolCall),
        Just(ActionType::LlmRequest),
        Just(ActionType::Decision),
        Just(ActionType::TaskStart),
        Just(ActionType::TaskComplete),
        Just(ActionType::Error),
        "[a-z_]{1,24}".prop_map(ActionType::Custom),
    ]
}

/// Arbitrary summaries within the 256-byte bound.
pub fn arb_summary() -> impl Strategy<Value = String> {
    "[ -~]{0,200}"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::fixture_time;
    use sigaid_core::{
        verify_chain, AgentId, Keypair, SignDomain, StateEntryBuilder,
    };

    proptest! {
        #[test]
        fn prop_agent_id_roundtrip(seed in arb_seed()) {
            let keypair = Keypair::from_seed(&seed);
            let id = keypair.agent_id();
            let parsed = AgentId::parse(id.as_str()).unwrap();
            prop_assert_eq!(parsed.public_key(), keypair.public_key());
        }

        #[test]
        fn prop_sign_verify(seed in arb_seed(), message in proptest::collection::vec(any::<u8>(), 0..256)) {
            let keypair = Keypair::from_seed(&seed);
            let signature = keypair.sign(SignDomain::State, &message);
            prop_assert!(keypair.public_key().verify(SignDomain::State, &message, &signature));

            // Any single-bit flip in the message defeats verification.
            if !message.is_empty() {
                let mut tampered = message.clone();
                tampered[0] ^= 0x01;
                prop_assert!(!keypair.public_key().verify(SignDomain::State, &tampered, &signature));
            }
        }

        #[test]
        fn prop_chain_builds_valid(
            seed in arb_seed(),
            actions in proptest::collection::vec((arb_action_type(), arb_summary()), 1..12),
        ) {
            let keypair = Keypair::from_seed(&seed);
            let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);

            let mut entries = Vec::new();
            for (i, (action_type, summary)) in actions.into_iter().enumerate() {
                let ts = fixture_time() + chrono::Duration::seconds(i as i64);
                let entry = builder
                    .build(entries.last(), action_type, &summary, summary.as_bytes(), ts)
                    .unwrap();
                entries.push(entry);
            }
            prop_assert!(verify_chain(&entries, &keypair.public_key()).is_ok());
        }

        #[test]
        fn prop_chain_detects_tamper(
            seed in arb_seed(),
            victim in 0usize..6,
        ) {
            let keypair = Keypair::from_seed(&seed);
            let identity = crate::fixtures::TestIdentity { agent_id: keypair.agent_id(), keypair };
            let mut chain = identity.make_chain(6);

            chain[victim].action_summary.push('!');
            prop_assert!(verify_chain(&chain, &identity.keypair.public_key()).is_err());
        }

        #[test]
        fn prop_face_renders_for_any_key(seed in arb_seed()) {
            let face = sigaid_face::Face::from_bytes(&seed);
            let svg = face.to_vector_graphic(200, false);
            prop_assert!(svg.starts_with("<svg "));
            prop_assert!(svg.ends_with("</svg>"));
        }

        #[test]
        fn prop_similarity_symmetric(a in arb_seed(), b in arb_seed()) {
            let fa = sigaid_face::Face::from_bytes(&a);
            let fb = sigaid_face::Face::from_bytes(&b);
            let d = fa.similarity(&fb);
            prop_assert!((0.0..=1.0).contains(&d));
            prop_assert_eq!(d, fb.similarity(&fa));
            prop_assert_eq!(fa.similarity(&fa), 0.0);
        }
    }
}
