//! SQLite implementation of the CacheStore trait

use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite-backed implementation of CacheStore
///
/// Generations survive process restarts, so a gateway restart with an
/// unchanged cache version serves from the already-populated generation.
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Create a new SQLite cache store
    ///
    /// If the database doesn't exist, it will be created with the required schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        // Entries table: one row per (generation, request identity)
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                generation TEXT NOT NULL,
                method TEXT NOT NULL,
                path TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (generation, method, path)
            )
            "#,
            [],
        )?;

        // Index for generation enumeration and deletion
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entries_generation ON entries(generation)",
            [],
        )?;

        info!("Cache store database schema initialized");
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCacheStore {
    async fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError> {
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Storage(Box::new(e)))?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT OR REPLACE INTO entries (generation, method, path, status, headers, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                generation,
                key.method,
                key.path,
                response.status as i64,
                headers,
                response.body,
                response.stored_at.to_rfc3339()
            ],
        )?;

        debug!(
            "Stored entry: generation={}, path={} ({} bytes)",
            generation,
            key.path,
            response.body.len()
        );
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT status, headers, body, stored_at FROM entries
             WHERE generation = ?1 AND method = ?2 AND path = ?3",
        )?;
        let mut rows = stmt.query_map(params![generation, key.method, key.path], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        match rows.next() {
            Some(Ok((status, headers, body, stored_at))) => {
                let headers: Vec<(String, String)> = serde_json::from_str(&headers)
                    .map_err(|e| CacheError::Database(e.to_string()))?;
                let stored_at = DateTime::parse_from_rfc3339(&stored_at)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| CacheError::Database(e.to_string()))?;
                Ok(Some(StoredResponse {
                    status: status as u16,
                    headers,
                    body,
                    stored_at,
                }))
            }
            Some(Err(e)) => Err(CacheError::Database(e.to_string())),
            None => Ok(None),
        }
    }

    async fn delete_generation(&self, generation: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn.execute("DELETE FROM entries WHERE generation = ?1", params![generation])?;

        debug!("Deleted generation {} ({} entries)", generation, deleted);
        Ok(())
    }

    async fn list_generations(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare("SELECT DISTINCT generation FROM entries ORDER BY generation")?;
        let generations: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(generations)
    }
}
