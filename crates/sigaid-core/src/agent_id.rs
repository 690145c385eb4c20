//! AgentId: the printable, checksummed agent identifier.
//!
//! Layout: the literal prefix `aid_` followed by Base58 (Bitcoin alphabet)
//! of the 32-byte Ed25519 public key concatenated with a 4-byte truncated
//! Blake3 checksum over the key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{ct_eq, Blake3Hash, Ed25519PublicKey};
use crate::error::CoreError;

/// The literal prefix on every agent id.
pub const AGENT_ID_PREFIX: &str = "aid_";

/// Checksum length in bytes.
const CHECKSUM_LEN: usize = 4;

/// A validated agent identifier.
///
/// Every `AgentId` in existence parses to a valid Ed25519 public point and
/// re-encodes to itself. Equality is byte-wise on the decoded key.
#[derive(Clone)]
pub struct AgentId {
    text: String,
    public_key: Ed25519PublicKey,
}

impl AgentId {
    /// Derive the agent id for a public key.
    ///
    /// Does not validate the point; keys produced by [`crate::Keypair`]
    /// are always valid.
    pub fn from_public_key(public_key: Ed25519PublicKey) -> Self {
        let checksum = checksum(&public_key);
        let mut data = Vec::with_capacity(32 + CHECKSUM_LEN);
        data.extend_from_slice(public_key.as_bytes());
        data.extend_from_slice(&checksum);
        let encoded = bs58::encode(data).into_string();
        Self {
            text: format!("{AGENT_ID_PREFIX}{encoded}"),
            public_key,
        }
    }

    /// Parse and validate an agent id string.
    ///
    /// Rejects a missing prefix, non-Base58 characters, wrong decoded
    /// length, checksum mismatch (compared in constant time), and byte
    /// strings that are not a valid Ed25519 public point.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let encoded = s
            .strip_prefix(AGENT_ID_PREFIX)
            .ok_or_else(|| CoreError::InvalidAgentId(format!("missing `{AGENT_ID_PREFIX}` prefix")))?;

        let data = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CoreError::InvalidAgentId(format!("invalid base58: {e}")))?;

        if data.len() != 32 + CHECKSUM_LEN {
            return Err(CoreError::InvalidAgentId(format!(
                "decoded length {} != {}",
                data.len(),
                32 + CHECKSUM_LEN
            )));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&data[..32]);
        let public_key = Ed25519PublicKey::from_bytes(key_bytes);

        let expected = checksum(&public_key);
        if !ct_eq(&data[32..], &expected) {
            return Err(CoreError::InvalidAgentId("checksum mismatch".into()));
        }

        if !public_key.validate() {
            return Err(CoreError::InvalidPublicKey);
        }

        Ok(Self {
            text: s.to_string(),
            public_key,
        })
    }

    /// The decoded public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.public_key
    }

    /// The full printable form.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Short form for logs: `aid_` plus the first 8 encoded characters.
    pub fn short(&self) -> String {
        let encoded = &self.text[AGENT_ID_PREFIX.len()..];
        let n = encoded.len().min(8);
        format!("{AGENT_ID_PREFIX}{}...", &encoded[..n])
    }
}

fn checksum(public_key: &Ed25519PublicKey) -> [u8; CHECKSUM_LEN] {
    let hash = Blake3Hash::hash(public_key.as_bytes());
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LEN]);
    out
}

impl PartialEq for AgentId {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl Eq for AgentId {}

impl std::hash::Hash for AgentId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.public_key.0.hash(state);
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.short())
    }
}

impl FromStr for AgentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_roundtrip() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let id = AgentId::from_public_key(keypair.public_key());
        assert!(id.as_str().starts_with("aid_"));

        let parsed = AgentId::parse(id.as_str()).unwrap();
        assert_eq!(parsed.public_key(), keypair.public_key());
        assert_eq!(parsed.as_str(), id.as_str());
    }

    #[test]
    fn test_stable_across_runs() {
        let kp1 = Keypair::from_seed(&[0x01; 32]);
        let kp2 = Keypair::from_seed(&[0x01; 32]);
        assert_eq!(
            AgentId::from_public_key(kp1.public_key()).as_str(),
            AgentId::from_public_key(kp2.public_key()).as_str()
        );
    }

    #[test]
    fn test_missing_prefix_rejected() {
        let keypair = Keypair::generate();
        let id = AgentId::from_public_key(keypair.public_key());
        let stripped = &id.as_str()[AGENT_ID_PREFIX.len()..];
        assert!(AgentId::parse(stripped).is_err());
    }

    #[test]
    fn test_bad_alphabet_rejected() {
        // '0', 'O', 'I', 'l' are excluded from the Bitcoin alphabet.
        assert!(AgentId::parse("aid_0OIl0OIl0OIl").is_err());
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let keypair = Keypair::generate();
        let id = AgentId::from_public_key(keypair.public_key());

        // Flip one character of the encoding.
        let mut chars: Vec<char> = id.as_str().chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let corrupted: String = chars.into_iter().collect();

        assert!(AgentId::parse(&corrupted).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(AgentId::parse("aid_2xyz").is_err());
    }

    #[test]
    fn test_equality_on_decoded_key() {
        let keypair = Keypair::generate();
        let a = AgentId::from_public_key(keypair.public_key());
        let b = AgentId::parse(a.as_str()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_roundtrip() {
        let keypair = Keypair::from_seed(&[0x07; 32]);
        let id = AgentId::from_public_key(keypair.public_key());
        let json = serde_json::to_string(&id).unwrap();
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
