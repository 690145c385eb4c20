//! Chain storage: the abstract interface for per-agent state chains.
//!
//! Implementations must make [`ChainStore::append`] atomic per agent:
//! the sequence/link checks and the insert happen under one lock or one
//! transaction, so concurrent writers for the same agent serialize and a
//! forking append can never slip in between check and insert.

use async_trait::async_trait;
use thiserror::Error;

use sigaid_core::{ChainHead, StateEntry};

pub mod memory;
pub mod migration;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result of an append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Entry accepted; the new head.
    Appended(ChainHead),

    /// The exact same entry is already stored (idempotent).
    Duplicate,

    /// The entry contradicts committed history. Terminal for the agent.
    Fork { current_head: ChainHead },

    /// The entry skips ahead or lags without conflicting content.
    SequenceMismatch { expected: u64 },
}

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid data in storage: {0}")]
    InvalidData(String),

    #[error("migration error: {0}")]
    Migration(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Async interface for chain persistence.
///
/// Readers may be concurrent; writers are serialized per agent by the
/// implementation.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Append an entry, validating sequence and hash linkage against the
    /// committed head atomically.
    async fn append(&self, entry: &StateEntry) -> Result<AppendOutcome, StoreError>;

    /// The committed head for an agent (GENESIS if no entries).
    async fn head(&self, agent_id: &str) -> Result<ChainHead, StoreError>;

    /// Fetch one entry by sequence number.
    async fn entry_at(&self, agent_id: &str, sequence: u64)
        -> Result<Option<StateEntry>, StoreError>;

    /// Fetch entries in ascending sequence, `offset` onward, at most
    /// `limit`.
    async fn range(
        &self,
        agent_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StateEntry>, StoreError>;

    /// Number of committed entries for an agent.
    async fn len(&self, agent_id: &str) -> Result<u64, StoreError>;
}

/// Shared append validation: decide the outcome of `entry` against the
/// committed head and the entry already at its position (if any).
///
/// Implementations call this under their per-agent lock or transaction.
pub(crate) fn classify_append(
    entry: &StateEntry,
    head: &ChainHead,
    at_position: Option<&StateEntry>,
) -> AppendOutcome {
    let expected = head.next_sequence();

    if entry.sequence == expected {
        if entry.prev_hash == head.entry_hash {
            AppendOutcome::Appended(ChainHead::of(entry))
        } else {
            AppendOutcome::Fork {
                current_head: *head,
            }
        }
    } else if (entry.sequence as i64) <= head.sequence {
        match at_position {
            Some(existing) if existing.entry_hash == entry.entry_hash => AppendOutcome::Duplicate,
            // Different content at a committed position is a fork.
            Some(_) => AppendOutcome::Fork {
                current_head: *head,
            },
            None => AppendOutcome::SequenceMismatch { expected },
        }
    } else {
        AppendOutcome::SequenceMismatch { expected }
    }
}
