//! Cryptographic primitives: Ed25519 with domain separation, Blake3,
//! HKDF-SHA256, constant-time comparison.
//!
//! Wraps the underlying libraries with strong types so the rest of the
//! workspace never touches raw byte slices for keys or signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Signing domains. The set is closed: every signature in the protocol is
/// made under exactly one of these labels, preventing cross-protocol reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignDomain {
    /// `agent.identity.v1` - identity assertions.
    Identity,
    /// `agent.state.v1` - state chain entries.
    State,
    /// `agent.lease.v1` - lease acquire requests.
    Lease,
    /// `agent.proof.v1` - proof bundle envelopes.
    Proof,
    /// `agent.challenge.v1` - verifier challenges.
    Challenge,
}

impl SignDomain {
    /// The ASCII label prefixed (length-tagged) onto every signed message.
    pub const fn label(self) -> &'static str {
        match self {
            SignDomain::Identity => "agent.identity.v1",
            SignDomain::State => "agent.state.v1",
            SignDomain::Lease => "agent.lease.v1",
            SignDomain::Proof => "agent.proof.v1",
            SignDomain::Challenge => "agent.challenge.v1",
        }
    }

    /// Build the domain-tagged message: `len16_be(label) || label || message`.
    pub fn tag_message(self, message: &[u8]) -> Vec<u8> {
        let label = self.label().as_bytes();
        let mut buf = Vec::with_capacity(2 + label.len() + message.len());
        buf.extend_from_slice(&(label.len() as u16).to_be_bytes());
        buf.extend_from_slice(label);
        buf.extend_from_slice(message);
        buf
    }
}

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash multiple parts together, each prefixed with its 4-byte
    /// big-endian length so the concatenation is unambiguous.
    pub fn hash_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u32).to_be_bytes());
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero hash (genesis sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Blake3Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Blake3Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::canonical::b64_encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Blake3Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = crate::canonical::b64_decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes. Does not validate the point; use
    /// [`Ed25519PublicKey::validate`] or [`crate::AgentId`] parsing for that.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check that the bytes decompress to a valid Ed25519 point.
    pub fn validate(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Verify a domain-separated signature. Returns a plain boolean; the
    /// reason for a failure is never exposed.
    pub fn verify(&self, domain: SignDomain, message: &[u8], signature: &Ed25519Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = Signature::from_bytes(&signature.0);
        let tagged = domain.tag_message(message);
        verifying_key.verify(&tagged, &sig).is_ok()
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::canonical::b64_encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = crate::canonical::b64_decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError)?;
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CryptoError)?;
        Ok(Self(arr))
    }

    /// The zero signature (placeholder only, never valid).
    pub const ZERO: Self = Self([0u8; 64]);
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::canonical::b64_encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = crate::canonical::b64_decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))?;
        Ok(Self(arr))
    }
}

/// An Ed25519 identity keypair.
///
/// The seed is secret material: it is zeroized on drop (via the underlying
/// signing key) and never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Derive a keypair from a 32-byte seed (deterministic).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message under the given domain.
    pub fn sign(&self, domain: SignDomain, message: &[u8]) -> Ed25519Signature {
        let tagged = domain.tag_message(message);
        Ed25519Signature(self.signing_key.sign(&tagged).to_bytes())
    }

    /// Get the raw seed, wrapped so the copy is zeroized when dropped.
    ///
    /// Handle with care: never log or transmit.
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Derive the agent id for this keypair.
    pub fn agent_id(&self) -> crate::AgentId {
        crate::AgentId::from_public_key(self.public_key())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Constant-time byte equality. Used on every MAC, checksum, and
/// signature comparison path.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// HKDF-SHA256 key derivation.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm).map_err(|_| CryptoError)?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(SignDomain::Identity, message);

        assert!(keypair
            .public_key()
            .verify(SignDomain::Identity, message, &signature));
    }

    #[test]
    fn test_tampered_message_fails() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(SignDomain::Identity, b"hello");

        assert!(!keypair
            .public_key()
            .verify(SignDomain::Identity, b"hellO", &signature));
    }

    #[test]
    fn test_wrong_domain_fails() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(SignDomain::Identity, b"hello");

        assert!(!keypair
            .public_key()
            .verify(SignDomain::State, b"hello", &signature));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let keypair = Keypair::generate();
        let mut signature = keypair.sign(SignDomain::Lease, b"hello");
        signature.0[0] ^= 0x01;

        assert!(!keypair
            .public_key()
            .verify(SignDomain::Lease, b"hello", &signature));
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_domain_tag_layout() {
        let tagged = SignDomain::State.tag_message(b"msg");
        let label = b"agent.state.v1";
        assert_eq!(&tagged[..2], &(label.len() as u16).to_be_bytes());
        assert_eq!(&tagged[2..2 + label.len()], label);
        assert_eq!(&tagged[2 + label.len()..], b"msg");
    }

    #[test]
    fn test_hash_parts_unambiguous() {
        // ("ab", "c") and ("a", "bc") must hash differently.
        let h1 = Blake3Hash::hash_parts(&[b"ab", b"c"]);
        let h2 = Blake3Hash::hash_parts(&[b"a", b"bc"]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"same", b"same"));
        assert!(!ct_eq(b"same", b"diff"));
        assert!(!ct_eq(b"same", b"longer"));
    }

    #[test]
    fn test_hkdf_deterministic() {
        let k1 = hkdf_sha256(b"ikm", b"salt", b"info", 32).unwrap();
        let k2 = hkdf_sha256(b"ikm", b"salt", b"info", 32).unwrap();
        assert_eq!(k1, k2);

        let k3 = hkdf_sha256(b"ikm", b"salt", b"other", 32).unwrap();
        assert_ne!(k1, k3);
    }
}
