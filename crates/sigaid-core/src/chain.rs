//! Chain verification: linkage, hashes, signatures, and the head type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::entry::StateEntry;

/// The head of an agent's chain: latest sequence and entry hash.
///
/// A fresh agent has sequence −1 and the zero hash; the next entry then
/// takes sequence 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub sequence: i64,
    pub entry_hash: Blake3Hash,
}

impl ChainHead {
    /// The head of an empty chain.
    pub const GENESIS: Self = Self {
        sequence: -1,
        entry_hash: Blake3Hash::ZERO,
    };

    /// Head after a given entry.
    pub fn of(entry: &StateEntry) -> Self {
        Self {
            sequence: entry.sequence as i64,
            entry_hash: entry.entry_hash,
        }
    }

    /// Sequence number the next appended entry must carry.
    pub fn next_sequence(&self) -> u64 {
        (self.sequence + 1) as u64
    }

    /// True if no entry has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.sequence < 0
    }
}

/// Why a chain segment failed verification. The sequence number pinpoints
/// the first offending entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("entry hash mismatch at sequence {sequence}")]
    HashMismatch { sequence: u64 },

    #[error("signature invalid at sequence {sequence}")]
    SignatureInvalid { sequence: u64 },

    #[error("broken hash link at sequence {sequence}")]
    BrokenLink { sequence: u64 },

    #[error("non-contiguous sequence at {sequence}: expected {expected}")]
    NonContiguous { sequence: u64, expected: u64 },

    #[error("genesis entry must have zero prev_hash")]
    BadGenesis,
}

/// Verify an ordered run of entries `E_a..E_b` offline.
///
/// Checks, for every entry: the entry hash recomputes and the signature
/// verifies under `public_key`; and for every adjacent pair: the hash link
/// and sequence continuity. If the run starts at sequence 0 its prev hash
/// must be zero; a run starting mid-chain is accepted as a segment.
pub fn verify_chain(
    entries: &[StateEntry],
    public_key: &Ed25519PublicKey,
) -> Result<(), ChainError> {
    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify_hash() {
            return Err(ChainError::HashMismatch {
                sequence: entry.sequence,
            });
        }
        if !entry.verify_signature(public_key) {
            return Err(ChainError::SignatureInvalid {
                sequence: entry.sequence,
            });
        }

        if i == 0 {
            if entry.sequence == 0 && entry.prev_hash != Blake3Hash::ZERO {
                return Err(ChainError::BadGenesis);
            }
        } else {
            let prev = &entries[i - 1];
            if entry.sequence != prev.sequence + 1 {
                return Err(ChainError::NonContiguous {
                    sequence: entry.sequence,
                    expected: prev.sequence + 1,
                });
            }
            if entry.prev_hash != prev.entry_hash {
                return Err(ChainError::BrokenLink {
                    sequence: entry.sequence,
                });
            }
        }
    }
    Ok(())
}
