//! SQLite implementation of the ChainStore trait.
//!
//! The primary persistent backend. Uses rusqlite with bundled SQLite,
//! wrapped in `spawn_blocking` so the async runtime never blocks on disk.
//! Appends run inside a transaction, which makes the head check and the
//! insert one atomic step.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use sigaid_core::canonical;
use sigaid_core::{ActionType, AgentId, Blake3Hash, ChainHead, Ed25519Signature, StateEntry};

use super::{classify_append, migration, AppendOutcome, ChainStore, StoreError};

/// SQLite-backed chain store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and migrate) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Useful for tests.
    pub fn open_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(conn: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        conn.lock()
            .map_err(|e| StoreError::Database(format!("mutex poisoned: {e}")))
    }
}

fn fixed<const N: usize>(bytes: Vec<u8>, what: &str) -> Result<[u8; N], StoreError> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("bad {what} length")))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<StateEntry, StoreError> {
    let agent_id: String = row.get::<_, String>(0).map_err(StoreError::from)?;
    let sequence: u64 = row.get(1).map_err(StoreError::from)?;
    let prev_hash: Vec<u8> = row.get(2).map_err(StoreError::from)?;
    let timestamp: String = row.get(3).map_err(StoreError::from)?;
    let action_type: String = row.get(4).map_err(StoreError::from)?;
    let action_summary: String = row.get(5).map_err(StoreError::from)?;
    let action_data_hash: Vec<u8> = row.get(6).map_err(StoreError::from)?;
    let signature: Vec<u8> = row.get(7).map_err(StoreError::from)?;
    let entry_hash: Vec<u8> = row.get(8).map_err(StoreError::from)?;

    Ok(StateEntry {
        agent_id: AgentId::parse(&agent_id)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        sequence,
        prev_hash: Blake3Hash::from_bytes(fixed(prev_hash, "prev_hash")?),
        timestamp: canonical::parse_timestamp(&timestamp)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        action_type: ActionType::from_name(&action_type),
        action_summary,
        action_data_hash: Blake3Hash::from_bytes(fixed(action_data_hash, "action_data_hash")?),
        signature: Ed25519Signature::from_bytes(fixed(signature, "signature")?),
        entry_hash: Blake3Hash::from_bytes(fixed(entry_hash, "entry_hash")?),
    })
}

const ENTRY_COLUMNS: &str = "agent_id, sequence, prev_hash, timestamp, action_type, \
                             action_summary, action_data_hash, signature, entry_hash";

fn query_head(conn: &Connection, agent_id: &str) -> Result<ChainHead, StoreError> {
    let row: Option<(u64, Vec<u8>)> = conn
        .query_row(
            "SELECT sequence, entry_hash FROM entries
             WHERE agent_id = ?1 ORDER BY sequence DESC LIMIT 1",
            params![agent_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((sequence, hash)) => Ok(ChainHead {
            sequence: sequence as i64,
            entry_hash: Blake3Hash::from_bytes(fixed(hash, "entry_hash")?),
        }),
        None => Ok(ChainHead::GENESIS),
    }
}

fn query_entry_at(
    conn: &Connection,
    agent_id: &str,
    sequence: u64,
) -> Result<Option<StateEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries WHERE agent_id = ?1 AND sequence = ?2"
    ))?;
    let mut rows = stmt.query(params![agent_id, sequence])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_entry(row)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl ChainStore for SqliteStore {
    async fn append(&self, entry: &StateEntry) -> Result<AppendOutcome, StoreError> {
        let entry = entry.clone();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = Self::lock(&conn)?;
            let tx = guard
                .transaction()
                .map_err(StoreError::from)?;

            let agent_id = entry.agent_id.to_string();
            let head = query_head(&tx, &agent_id)?;
            let at_position = query_entry_at(&tx, &agent_id, entry.sequence)?;

            let outcome = classify_append(&entry, &head, at_position.as_ref());
            if matches!(outcome, AppendOutcome::Appended(_)) {
                tx.execute(
                    &format!(
                        "INSERT INTO entries ({ENTRY_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                    ),
                    params![
                        agent_id,
                        entry.sequence,
                        entry.prev_hash.as_bytes().as_slice(),
                        canonical::format_timestamp(entry.timestamp),
                        entry.action_type.as_str(),
                        entry.action_summary,
                        entry.action_data_hash.as_bytes().as_slice(),
                        entry.signature.as_bytes().as_slice(),
                        entry.entry_hash.as_bytes().as_slice(),
                    ],
                )?;
            }
            tx.commit().map_err(StoreError::from)?;
            Ok(outcome)
        })
        .await
        .map_err(|e| StoreError::Database(format!("join error: {e}")))?
    }

    async fn head(&self, agent_id: &str) -> Result<ChainHead, StoreError> {
        let agent_id = agent_id.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = Self::lock(&conn)?;
            query_head(&guard, &agent_id)
        })
        .await
        .map_err(|e| StoreError::Database(format!("join error: {e}")))?
    }

    async fn entry_at(
        &self,
        agent_id: &str,
        sequence: u64,
    ) -> Result<Option<StateEntry>, StoreError> {
        let agent_id = agent_id.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = Self::lock(&conn)?;
            query_entry_at(&guard, &agent_id, sequence)
        })
        .await
        .map_err(|e| StoreError::Database(format!("join error: {e}")))?
    }

    async fn range(
        &self,
        agent_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StateEntry>, StoreError> {
        let agent_id = agent_id.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = Self::lock(&conn)?;
            let mut stmt = guard.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE agent_id = ?1 ORDER BY sequence ASC LIMIT ?2 OFFSET ?3"
            ))?;
            let mut rows = stmt.query(params![agent_id, limit, offset])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
        .map_err(|e| StoreError::Database(format!("join error: {e}")))?
    }

    async fn len(&self, agent_id: &str) -> Result<u64, StoreError> {
        let agent_id = agent_id.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = Self::lock(&conn)?;
            let count: u64 = guard.query_row(
                "SELECT COUNT(*) FROM entries WHERE agent_id = ?1",
                params![agent_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(|e| StoreError::Database(format!("join error: {e}")))?
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
            out.push(
                builder
                    .build(out.last(), ActionType::ToolCall, &format!("s{i}"), b"x", ts)
                    .unwrap(),
            );
        }
        out
    }

    #[tokio::test]
    async fn test_append_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::from_seed(&[0x31; 32]);
        let chain = entries(&keypair, 3);

        for e in &chain {
            assert!(matches!(
                store.append(e).await.unwrap(),
                AppendOutcome::Appended(_)
            ));
        }

        let agent = keypair.agent_id();
        let head = store.head(agent.as_str()).await.unwrap();
        assert_eq!(head.sequence, 2);

        let loaded = store.entry_at(agent.as_str(), 1).await.unwrap().unwrap();
        assert_eq!(loaded, chain[1]);
        assert!(loaded.verify_hash());
    }

    #[tokio::test]
    async fn test_fork_leaves_store_untouched() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::from_seed(&[0x31; 32]);
        let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
        let ts = Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap();

        let chain = entries(&keypair, 3);
        for e in &chain {
            store.append(e).await.unwrap();
        }

        let forked = builder
            .build(Some(&chain[0]), ActionType::ToolCall, "fork", b"", ts)
            .unwrap();
        assert!(matches!(
            store.append(&forked).await.unwrap(),
            AppendOutcome::Fork { .. }
        ));
        assert_eq!(store.len(keypair.agent_id().as_str()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_range_pagination() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::from_seed(&[0x31; 32]);
        let chain = entries(&keypair, 5);
        for e in &chain {
            store.append(e).await.unwrap();
        }

        let page = store.range(keypair.agent_id().as_str(), 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 2);
        assert_eq!(page[1].sequence, 3);
    }

    #[tokio::test]
    async fn test_persistence_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.db");
        let keypair = Keypair::from_seed(&[0x31; 32]);
        let chain = entries(&keypair, 2);

        {
            let store = SqliteStore::open(&path).unwrap();
            for e in &chain {
                store.append(e).await.unwrap();
            }
        }

        let store = SqliteStore::open(&path).unwrap();
        let head = store.head(keypair.agent_id().as_str()).await.unwrap();
        assert_eq!(head.sequence, 1);
        assert_eq!(head.entry_hash, chain[1].entry_hash);
    }
}
