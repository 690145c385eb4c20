//! In-memory implementation of the ChainStore trait.
//!
//! Primarily for tests. Same semantics as SQLite, no persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use sigaid_core::{ChainHead, StateEntry};

use super::{classify_append, AppendOutcome, ChainStore, StoreError};

/// In-memory chain store. Thread-safe via RwLock; the write lock makes
/// appends atomic across all agents (coarser than needed, fine for tests).
#[derive(Default)]
pub struct MemoryStore {
    chains: RwLock<HashMap<String, Vec<StateEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn head_of(entries: &[StateEntry]) -> ChainHead {
        entries.last().map(ChainHead::of).unwrap_or(ChainHead::GENESIS)
    }
}

#[async_trait]
impl ChainStore for MemoryStore {
    async fn append(&self, entry: &StateEntry) -> Result<AppendOutcome, StoreError> {
        let mut chains = self.chains.write().unwrap();
        let chain = chains.entry(entry.agent_id.to_string()).or_default();

        let head = Self::head_of(chain);
        let at_position = chain.get(entry.sequence as usize);

        let outcome = classify_append(entry, &head, at_position);
        if matches!(outcome, AppendOutcome::Appended(_)) {
            chain.push(entry.clone());
        }
        Ok(outcome)
    }

    async fn head(&self, agent_id: &str) -> Result<ChainHead, StoreError> {
        let chains = self.chains.read().unwrap();
        Ok(chains
            .get(agent_id)
            .map(|c| Self::head_of(c))
            .unwrap_or(ChainHead::GENESIS))
    }

    async fn entry_at(
        &self,
        agent_id: &str,
        sequence: u64,
    ) -> Result<Option<StateEntry>, StoreError> {
        let chains = self.chains.read().unwrap();
        Ok(chains
            .get(agent_id)
            .and_then(|c| c.get(sequence as usize))
            .cloned())
    }

    async fn range(
        &self,
        agent_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StateEntry>, StoreError> {
        let chains = self.chains.read().unwrap();
        Ok(chains
            .get(agent_id)
            .map(|c| {
                c.iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn len(&self, agent_id: &str) -> Result<u64, StoreError> {
        let chains = self.chains.read().unwrap();
        Ok(chains.get(agent_id).map(|c| c.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sigaid_core::{ActionType, Keypair, StateEntryBuilder};

    fn entries(keypair: &Keypair, n: usize) -> Vec<StateEntry> {
        let builder = StateEntryBuilder::new(keypair.agent_id(), keypair);
        let ts = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();
        let mut out: Vec<StateEntry> = Vec::new();
        for i in 0..n {
            let e = builder
                .build(out.last(), ActionType::ToolCall, &format!("s{i}"), b"", ts)
                .unwrap();
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn test_append_and_head() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let chain = entries(&keypair, 3);

        for e in &chain {
            let outcome = store.append(e).await.unwrap();
            assert!(matches!(outcome, AppendOutcome::Appended(_)));
        }

        let head = store.head(keypair.agent_id().as_str()).await.unwrap();
        assert_eq!(head.sequence, 2);
        assert_eq!(head.entry_hash, chain[2].entry_hash);
        assert_eq!(store.len(keypair.agent_id().as_str()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_append() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let chain = entries(&keypair, 2);

        store.append(&chain[0]).await.unwrap();
        store.append(&chain[1]).await.unwrap();
        let outcome = store.append(&chain[1]).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_fork_rejected() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let ts = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();

        let chain = entries(&keypair, 3);
        for e in &chain {
            store.append(e).await.unwrap();
        }

        // A competing sequence-2 entry linked to entry 0: wrong prev for
        // its sequence, conflicting content at a committed position.
        let forked = builder
            .build(Some(&chain[0]), ActionType::ToolCall, "other", b"", ts)
            .unwrap();
        assert_eq!(forked.sequence, 1);

        match store.append(&forked).await.unwrap() {
            AppendOutcome::Fork { current_head } => {
                assert_eq!(current_head.sequence, 2);
            }
            other => panic!("expected Fork, got {other:?}"),
        }

        // Store unchanged.
        assert_eq!(store.len(keypair.agent_id().as_str()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_wrong_prev_at_next_sequence_is_fork() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let ts = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();

        let chain = entries(&keypair, 3);
        for e in &chain {
            store.append(e).await.unwrap();
        }

        // sequence = head+1 but prev points at entry 1 instead of 2.
        let mut bad_parent = chain[1].clone();
        bad_parent.sequence = 2; // pretend head was (2, H1)
        let forked = builder
            .build(Some(&bad_parent), ActionType::ToolCall, "x", b"", ts)
            .unwrap();
        assert_eq!(forked.sequence, 3);

        assert!(matches!(
            store.append(&forked).await.unwrap(),
            AppendOutcome::Fork { .. }
        ));
    }

    #[tokio::test]
    async fn test_sequence_gap_rejected() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let chain = entries(&keypair, 3);

        store.append(&chain[0]).await.unwrap();
        let outcome = store.append(&chain[2]).await.unwrap();
        assert_eq!(outcome, AppendOutcome::SequenceMismatch { expected: 1 });
    }

    #[tokio::test]
    async fn test_range() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let chain = entries(&keypair, 5);
        for e in &chain {
            store.append(e).await.unwrap();
        }

        let page = store
            .range(keypair.agent_id().as_str(), 1, 2)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 1);
        assert_eq!(page[1].sequence, 2);
    }
}
