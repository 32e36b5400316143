//! In-memory implementation of the CacheStore trait

use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory CacheStore, for tests and ephemeral deployments
///
/// Entries are lost on restart; a fresh process simply reinstalls its
/// generation from the upstream.
#[derive(Default)]
pub struct MemoryCacheStore {
    generations: RwLock<HashMap<String, HashMap<RequestKey, StoredResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held by a generation
    pub async fn len(&self, generation: &str) -> usize {
        self.generations
            .read()
            .await
            .get(generation)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError> {
        let mut generations = self.generations.write().await;
        generations
            .entry(generation.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn delete_generation(&self, generation: &str) -> Result<(), CacheError> {
        let mut generations = self.generations.write().await;
        generations.remove(generation);
        Ok(())
    }

    async fn list_generations(&self) -> Result<Vec<String>, CacheError> {
        let generations = self.generations.read().await;
        let mut names: Vec<String> = generations.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("/index.html");

        assert!(store.get("v1", &key).await.unwrap().is_none());

        store
            .put("v1", &key, &StoredResponse::empty(200))
            .await
            .unwrap();
        assert!(store.get("v1", &key).await.unwrap().is_some());
        assert_eq!(store.len("v1").await, 1);

        store.delete_generation("v1").await.unwrap();
        assert!(store.get("v1", &key).await.unwrap().is_none());
        assert!(store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_generations_sorted() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get("/");
        store.put("v2", &key, &StoredResponse::empty(200)).await.unwrap();
        store.put("v1", &key, &StoredResponse::empty(200)).await.unwrap();

        assert_eq!(store.list_generations().await.unwrap(), vec!["v1", "v2"]);
    }
}
