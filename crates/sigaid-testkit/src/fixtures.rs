//! Test fixtures: deterministic identities and chains.

use chrono::{DateTime, TimeZone, Utc};

use sigaid_core::{ActionType, AgentId, Keypair, StateEntry, StateEntryBuilder};

/// A fixed timestamp used by deterministic fixtures.
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap()
}

/// A deterministic agent identity for tests.
pub struct TestIdentity {
    pub keypair: Keypair,
    pub agent_id: AgentId,
}

impl TestIdentity {
    /// Identity derived from a fixed seed byte.
    pub fn from_seed_byte(b: u8) -> Self {
        let keypair = Keypair::from_seed(&[b; 32]);
        let agent_id = keypair.agent_id();
        Self { keypair, agent_id }
    }

    /// A fresh random identity.
    pub fn random() -> Self {
        let keypair = Keypair::generate();
        let agent_id = keypair.agent_id();
        Self { keypair, agent_id }
    }

    /// Build a valid chain of `len` entries, one second apart.
    pub fn make_chain(&self, len: usize) -> Vec<StateEntry> {
        let builder = StateEntryBuilder::new(self.agent_id.clone(), &self.keypair);
        let mut entries: Vec<StateEntry> = Vec::with_capacity(len);
        for i in 0..len {
            let ts = fixture_time() + chrono::Duration::seconds(i as i64);
            let entry = builder
                .build(
                    entries.last(),
                    ActionType::ToolCall,
                    &format!("fixture action {i}"),
                    format!("fixture payload {i}").as_bytes(),
                    ts,
                )
                .expect("fixture summaries are short");
            entries.push(entry);
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigaid_core::verify_chain;

    #[test]
    fn test_identity_deterministic() {
        let a = TestIdentity::from_seed_byte(0x42);
        let b = TestIdentity::from_seed_byte(0x42);
        assert_eq!(a.agent_id, b.agent_id);
    }

    #[test]
    fn test_fixture_chain_is_valid() {
        let id = TestIdentity::from_seed_byte(0x42);
        let chain = id.make_chain(6);
        assert_eq!(chain.len(), 6);
        assert!(verify_chain(&chain, &id.keypair.public_key()).is_ok());
    }
}
