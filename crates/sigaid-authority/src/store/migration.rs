//! Schema migrations for the SQLite chain store.

use rusqlite::Connection;

use super::StoreError;

/// Current schema version.
const SCHEMA_VERSION: i64 = 1;

/// Run migrations up to the current schema version.
pub fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    if version < 1 {
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS entries (
                 agent_id          TEXT    NOT NULL,
                 sequence          INTEGER NOT NULL,
                 prev_hash         BLOB    NOT NULL,
                 timestamp         TEXT    NOT NULL,
                 action_type       TEXT    NOT NULL,
                 action_summary    TEXT    NOT NULL,
                 action_data_hash  BLOB    NOT NULL,
                 signature         BLOB    NOT NULL,
                 entry_hash        BLOB    NOT NULL,
                 PRIMARY KEY (agent_id, sequence)
             );
             CREATE INDEX IF NOT EXISTS idx_entries_agent
                 ON entries (agent_id, sequence);
             PRAGMA user_version = 1;
             COMMIT;",
        )
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    }

    if version > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
    }
}
