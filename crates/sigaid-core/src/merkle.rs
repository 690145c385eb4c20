//! Merkle inclusion proofs over a chain's entry hashes.
//!
//! The tree is binary, padded with the zero hash to the next power of two.
//! Leaf: `BLAKE3(0x00 || entry_hash)`. Internal: `BLAKE3(0x01 || left ||
//! right)`. The domain prefixes keep leaves and internal nodes from ever
//! colliding.

use serde::{Deserialize, Serialize};

use crate::crypto::Blake3Hash;
use crate::entry::StateEntry;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

fn leaf_hash(entry_hash: &Blake3Hash) -> Blake3Hash {
    let mut buf = [0u8; 33];
    buf[0] = LEAF_PREFIX;
    buf[1..].copy_from_slice(entry_hash.as_bytes());
    Blake3Hash::hash(&buf)
}

fn node_hash(left: &Blake3Hash, right: &Blake3Hash) -> Blake3Hash {
    let mut buf = [0u8; 65];
    buf[0] = NODE_PREFIX;
    buf[1..33].copy_from_slice(left.as_bytes());
    buf[33..].copy_from_slice(right.as_bytes());
    Blake3Hash::hash(&buf)
}

/// An inclusion proof: the sibling path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the proven leaf (the entry's sequence number).
    pub leaf_index: u64,

    /// Sibling hashes, leaf level first.
    pub siblings: Vec<Blake3Hash>,

    /// For each sibling, whether it sits on the right of the path.
    pub sibling_on_right: Vec<bool>,
}

impl MerkleProof {
    /// Check the path from `entry_hash` up against a committed root.
    pub fn verify(&self, entry_hash: &Blake3Hash, expected_root: &Blake3Hash) -> bool {
        if self.siblings.len() != self.sibling_on_right.len() {
            return false;
        }

        let mut current = leaf_hash(entry_hash);
        for (sibling, on_right) in self.siblings.iter().zip(&self.sibling_on_right) {
            current = if *on_right {
                node_hash(&current, sibling)
            } else {
                node_hash(sibling, &current)
            };
        }
        current == *expected_root
    }
}

/// A Merkle tree over entry hashes.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Levels bottom-up; `levels[0]` is the padded leaf level.
    levels: Vec<Vec<Blake3Hash>>,
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree from raw entry hashes.
    pub fn from_hashes(entry_hashes: &[Blake3Hash]) -> Self {
        let leaf_count = entry_hashes.len();

        let padded = entry_hashes.len().max(1).next_power_of_two();
        let mut level: Vec<Blake3Hash> = entry_hashes.iter().map(leaf_hash).collect();
        level.resize(padded, leaf_hash(&Blake3Hash::ZERO));

        let mut levels = vec![level];
        while levels.last().unwrap().len() > 1 {
            let below = levels.last().unwrap();
            let above: Vec<Blake3Hash> = below
                .chunks(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(above);
        }

        Self { levels, leaf_count }
    }

    /// Build a tree from chain entries, in sequence order.
    pub fn from_entries(entries: &[StateEntry]) -> Self {
        let hashes: Vec<Blake3Hash> = entries.iter().map(|e| e.entry_hash).collect();
        Self::from_hashes(&hashes)
    }

    /// The committed root.
    pub fn root(&self) -> Blake3Hash {
        self.levels.last().unwrap()[0]
    }

    /// Number of real (unpadded) leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Inclusion proof for the leaf at `index`, or `None` out of range.
    pub fn proof(&self, index: u64) -> Option<MerkleProof> {
        if index as usize >= self.leaf_count {
            return None;
        }

        let mut siblings = Vec::new();
        let mut sibling_on_right = Vec::new();
        let mut pos = index as usize;

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_pos, on_right) = if pos % 2 == 0 {
                (pos + 1, true)
            } else {
                (pos - 1, false)
            };
            siblings.push(level[sibling_pos]);
            sibling_on_right.push(on_right);
            pos /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            siblings,
            sibling_on_right,
        })
    }
}
