//! # SigAid Core
//!
//! Pure primitives for the SigAid protocol: agent identity, domain-separated
//! signing, hash-linked state chains, Merkle inclusion proofs, and proof
//! bundles.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Keypair`] - Ed25519 identity keypair (seed zeroized on drop)
//! - [`AgentId`] - Printable, checksummed identifier (`aid_...`)
//! - [`StateEntry`] - One signed, hash-linked entry in an agent's chain
//! - [`ProofBundle`] - The compact object a service challenges for
//!
//! ## Canonicalization
//!
//! Everything that is signed or hashed goes through the fixed byte layouts
//! in [`canonical`]: big-endian length prefixes for variable fields, raw
//! bytes for fixed-size fields. The same bytes produce the same hashes on
//! every platform.

pub mod agent_id;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod merkle;
pub mod proof;
pub mod token;
pub mod wire;

pub use agent_id::AgentId;
pub use chain::{verify_chain, ChainError, ChainHead};
pub use crypto::{
    ct_eq, hkdf_sha256, Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair, SignDomain,
};
pub use entry::{ActionType, StateEntry, StateEntryBuilder, MAX_SUMMARY_BYTES};
pub use error::{CoreError, CryptoError};
pub use merkle::{MerkleProof, MerkleTree};
pub use proof::{
    Challenge, ProofBundle, ProofBundleBuilder, ReasonCode, VerificationOutcome, VerifyPolicy,
};
pub use token::{LeaseClaims, TokenError, CLOCK_SKEW};
