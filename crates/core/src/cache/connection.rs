//! SQLite handle for the cache store.
//!
//! Every handle, file-backed or in-memory, gets the same pragmas before the
//! schema is migrated: WAL journaling, relaxed sync, a busy timeout for
//! concurrent writers, and foreign keys so deleting a cache drops its entries.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=5000;
     PRAGMA foreign_keys=ON;";

/// SQLite-backed [`CacheStore`](super::CacheStore).
///
/// Cloning is cheap; clones share one background connection thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open a private in-memory database; its contents vanish with the last clone.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let enabled: i64 = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_deleting_cache_row_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let remaining: i64 = db
            .conn
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO caches (name, created_at) VALUES ('app-images-v1', '2026-01-01T00:00:00.000000Z');
                     INSERT INTO entries (cache_name, key, status, headers_json, body, stored_at, seq)
                     VALUES ('app-images-v1', 'https://app.test/a.png', 200, '[]', x'00',
                             '2026-01-01T00:00:00.000000Z', 1);
                     DELETE FROM caches WHERE name = 'app-images-v1';",
                )?;
                conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
