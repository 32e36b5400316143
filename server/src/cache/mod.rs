//! Response caching for Pagekeeper
//!
//! This module provides the generation-partitioned response store: every
//! cache entry belongs to a named generation (the deployed cache version),
//! and a generation swap replaces the whole cache rather than evicting
//! individual entries.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for cache and upstream operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// Identity of a cacheable request within a generation
///
/// Effectively GET-only: non-GET traffic is never intercepted, so it never
/// reaches the store. The path includes the query string verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub path: String,
}

impl RequestKey {
    /// Key for a GET request to `path`
    pub fn get(path: &str) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.to_string(),
        }
    }
}

/// A response as held by the cache store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    /// Selected headers (lowercase names), at minimum `content-type`
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// A bodyless synthetic response, used when a strategy has nothing to serve
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            stored_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name == "content-type")
            .map(|(_, value)| value.as_str())
    }
}

/// Trait for generation-partitioned response storage
///
/// This abstraction allows for different storage backends (SQLite, in-memory)
/// while maintaining a consistent interface for the strategies and the
/// generation lifecycle. Individual operations are atomic; concurrent puts
/// for the same key are last-write-wins.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Insert or overwrite the entry for `key` within `generation`
    async fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError>;

    /// Look up the entry for `key` within `generation`
    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError>;

    /// Remove a generation and every entry it owns
    async fn delete_generation(&self, generation: &str) -> Result<(), CacheError>;

    /// List the names of all generations that currently hold entries
    async fn list_generations(&self) -> Result<Vec<String>, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_get() {
        let key = RequestKey::get("/index.html");
        assert_eq!(key.method, "GET");
        assert_eq!(key.path, "/index.html");
    }

    #[test]
    fn test_empty_response() {
        let response = StoredResponse::empty(504);
        assert_eq!(response.status, 504);
        assert!(response.body.is_empty());
        assert!(!response.is_success());
    }

    #[test]
    fn test_content_type_lookup() {
        let response = StoredResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: b"<html></html>".to_vec(),
            stored_at: Utc::now(),
        };
        assert_eq!(response.content_type(), Some("text/html"));
        assert!(response.is_success());
    }
}
