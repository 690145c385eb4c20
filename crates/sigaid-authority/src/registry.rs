//! Agent registry: identities known to the Authority, with reputation
//! counters.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use sigaid_core::canonical;
use sigaid_core::wire::{AgentInfo, Reputation};
use sigaid_core::{AgentId, Ed25519PublicKey};

use crate::error::AuthorityError;

/// A registered agent.
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    pub agent_id: AgentId,
    pub public_key: Ed25519PublicKey,
    pub registered_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub reputation: Reputation,
}

impl RegisteredAgent {
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.agent_id.to_string(),
            public_key_base64: canonical::b64_encode(self.public_key.as_bytes()),
            registered_at: self.registered_at,
            reputation: self.reputation,
        }
    }
}

/// All agents known to this Authority.
#[derive(Default)]
pub struct Registry {
    agents: RwLock<HashMap<String, RegisteredAgent>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. The supplied public key must be the one the
    /// agent id encodes; anything else is rejected before storage.
    pub fn register(
        &self,
        agent_id: AgentId,
        public_key: Ed25519PublicKey,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<AgentInfo, AuthorityError> {
        if agent_id.public_key() != public_key {
            return Err(AuthorityError::BadRequest(
                "public key does not match agent id".into(),
            ));
        }

        let mut agents = self.agents.write().unwrap();
        if agents.contains_key(agent_id.as_str()) {
            return Err(AuthorityError::AgentExists(agent_id.to_string()));
        }

        let agent = RegisteredAgent {
            agent_id: agent_id.clone(),
            public_key,
            registered_at: now,
            metadata,
            reputation: Reputation::default(),
        };
        let info = agent.info();
        agents.insert(agent_id.to_string(), agent);
        Ok(info)
    }

    /// Look up the registered public key for an agent.
    pub fn public_key(&self, agent_id: &str) -> Result<Ed25519PublicKey, AuthorityError> {
        self.agents
            .read()
            .unwrap()
            .get(agent_id)
            .map(|a| a.public_key)
            .ok_or_else(|| AuthorityError::AgentNotFound(agent_id.to_string()))
    }

    /// Fetch the full agent record.
    pub fn get(&self, agent_id: &str) -> Result<AgentInfo, AuthorityError> {
        self.agents
            .read()
            .unwrap()
            .get(agent_id)
            .map(|a| a.info())
            .ok_or_else(|| AuthorityError::AgentNotFound(agent_id.to_string()))
    }

    /// Bump the verification counters after a `/v1/verify` call.
    pub fn record_verification(&self, agent_id: &str, success: bool) {
        if let Some(agent) = self.agents.write().unwrap().get_mut(agent_id) {
            if success {
                agent.reputation.successful_verifications += 1;
            } else {
                agent.reputation.failed_verifications += 1;
            }
        }
    }

    /// Track the chain length for the reputation record.
    pub fn set_chain_length(&self, agent_id: &str, length: u64) {
        if let Some(agent) = self.agents.write().unwrap().get_mut(agent_id) {
            agent.reputation.chain_length = length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigaid_core::Keypair;

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new();
        let keypair = Keypair::from_seed(&[0x05; 32]);
        let id = keypair.agent_id();

        let info = registry
            .register(id.clone(), keypair.public_key(), None, Utc::now())
            .unwrap();
        assert_eq!(info.agent_id, id.to_string());

        let fetched = registry.get(id.as_str()).unwrap();
        assert_eq!(fetched.agent_id, id.to_string());
        assert_eq!(registry.public_key(id.as_str()).unwrap(), keypair.public_key());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = Registry::new();
        let keypair = Keypair::generate();
        let id = keypair.agent_id();

        registry
            .register(id.clone(), keypair.public_key(), None, Utc::now())
            .unwrap();
        let err = registry
            .register(id, keypair.public_key(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::AgentExists(_)));
    }

    #[test]
    fn test_key_id_mismatch_rejected() {
        let registry = Registry::new();
        let keypair = Keypair::generate();
        let other = Keypair::generate();

        let err = registry
            .register(keypair.agent_id(), other.public_key(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::BadRequest(_)));
    }

    #[test]
    fn test_unknown_agent() {
        let registry = Registry::new();
        assert!(matches!(
            registry.public_key("aid_unknown"),
            Err(AuthorityError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_reputation_counters() {
        let registry = Registry::new();
        let keypair = Keypair::generate();
        let id = keypair.agent_id();
        registry
            .register(id.clone(), keypair.public_key(), None, Utc::now())
            .unwrap();

        registry.record_verification(id.as_str(), true);
        registry.record_verification(id.as_str(), true);
        registry.record_verification(id.as_str(), false);
        registry.set_chain_length(id.as_str(), 7);

        let info = registry.get(id.as_str()).unwrap();
        assert_eq!(info.reputation.successful_verifications, 2);
        assert_eq!(info.reputation.failed_verifications, 1);
        assert_eq!(info.reputation.chain_length, 7);
    }
}
