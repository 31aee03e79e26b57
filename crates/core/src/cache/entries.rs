//! Entry CRUD operations for the SQLite store.
//!
//! Entries live in one table keyed by `(cache_name, key)`; a monotonically
//! increasing `seq` column records insertion order for count-based eviction.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::{CacheEntry, CacheStore};
use crate::Error;
use crate::response::HttpResponse;

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct EntryRow {
    key: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            status: row.get(1)?,
            headers_json: row.get(2)?,
            body: row.get(3)?,
            stored_at: row.get(4)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptEntry(format!("{}: status {}", self.key, self.status)))?;
        let response = HttpResponse::from_parts(status, &self.headers_json, self.body)
            .map_err(|e| Error::CorruptEntry(format!("{}: headers: {e}", self.key)))?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptEntry(format!("{}: stored_at: {e}", self.key)))?
            .with_timezone(&Utc);
        Ok(CacheEntry { key: self.key, response, stored_at })
    }
}

fn insert_entry(conn: &rusqlite::Connection, cache_name: &str, entry: &CacheEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![cache_name, encode_timestamp(&Utc::now())],
    )?;
    conn.execute(
        "INSERT INTO entries (cache_name, key, status, headers_json, body, stored_at, seq)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries))
        ON CONFLICT(cache_name, key) DO UPDATE SET
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at,
            seq = excluded.seq",
        params![
            cache_name,
            &entry.key,
            entry.response.status as i64,
            entry.response.headers_json(),
            entry.response.body.as_ref(),
            encode_timestamp(&entry.stored_at),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        let cache_name = cache_name.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, status, headers_json, body, stored_at
                    FROM entries WHERE cache_name = ?1 AND key = ?2",
                )?;

                match stmt.query_row(params![cache_name, key], EntryRow::read) {
                    Ok(row) => Ok(Some(row.into_entry()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, cache_name: &str, entry: CacheEntry) -> Result<(), Error> {
        self.put_all(cache_name, vec![entry]).await
    }

    async fn put_all(&self, cache_name: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_entry(&tx, &cache_name, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key = ?2",
                    params![cache_name, key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE cache_name = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![cache_name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, cache_name: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE cache_name = ?1", params![cache_name])?;
                let count = tx.execute("DELETE FROM caches WHERE name = ?1", params![cache_name])?;
                tx.commit()?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn trim_oldest(&self, cache_name: &str, max_entries: usize) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE cache_name = ?1",
                    params![cache_name],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key IN (
                    SELECT key FROM entries WHERE cache_name = ?1 ORDER BY seq ASC LIMIT ?2
                )",
                    params![cache_name, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_stored_before(&self, cache_name: &str, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        let cutoff = encode_timestamp(&cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND stored_at < ?2",
                    params![cache_name, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
