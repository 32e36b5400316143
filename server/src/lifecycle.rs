//! Cache generation lifecycle: install a new generation, retire the rest

use crate::cache::{CacheError, CacheStore, RequestKey};
use crate::config::Config;
use crate::upstream::Upstream;
use futures::future::join_all;
use tracing::{info, warn};

/// Populate the configured generation from the upstream origin
///
/// Required assets are fetched with the HTTP-cache bypass and must all
/// store; the first failure aborts the install and leaves previously
/// installed generations untouched, so the caller can retry later. Optional
/// assets are best-effort and isolated from one another.
pub async fn install(
    config: &Config,
    store: &dyn CacheStore,
    upstream: &dyn Upstream,
) -> Result<(), CacheError> {
    let generation = &config.cache_version;
    info!("Installing cache generation {}", generation);

    for path in &config.required_assets {
        let response = upstream.fetch(path, true).await?;
        if !response.is_success() {
            return Err(CacheError::Upstream(format!(
                "required asset {} returned status {}",
                path, response.status
            )));
        }
        store.put(generation, &RequestKey::get(path), &response).await?;
    }

    let optional = join_all(config.optional_assets.iter().map(|path| async move {
        let result = match upstream.fetch(path, true).await {
            Ok(response) if response.is_success() => {
                store.put(generation, &RequestKey::get(path), &response).await
            }
            Ok(response) => Err(CacheError::Upstream(format!(
                "status {}",
                response.status
            ))),
            Err(e) => Err(e),
        };
        (path.as_str(), result)
    }))
    .await;

    let mut cached = 0;
    for (path, result) in optional {
        match result {
            Ok(()) => cached += 1,
            Err(e) => warn!("Skipping optional asset {}: {}", path, e),
        }
    }

    info!(
        "Installed generation {} ({} required, {}/{} optional)",
        generation,
        config.required_assets.len(),
        cached,
        config.optional_assets.len()
    );
    Ok(())
}

/// Make the configured generation the only one in the store
///
/// Every other generation is deleted, unconditionally and concurrently;
/// deletion failures are logged and otherwise ignored. Serving starts
/// immediately once this returns.
pub async fn activate(config: &Config, store: &dyn CacheStore) -> Result<(), CacheError> {
    let current = &config.cache_version;

    let stale: Vec<String> = store
        .list_generations()
        .await?
        .into_iter()
        .filter(|name| name != current)
        .collect();

    let results = join_all(stale.iter().map(|name| async move {
        (name.as_str(), store.delete_generation(name).await)
    }))
    .await;

    for (name, result) in results {
        match result {
            Ok(()) => info!("Deleted stale generation {}", name),
            Err(e) => warn!("Failed to delete stale generation {}: {}", name, e),
        }
    }

    info!("Cache generation {} is active", current);
    Ok(())
}
