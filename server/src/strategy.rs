//! Fetch/cache strategies executed against the current generation

use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use crate::upstream::Upstream;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a strategy needs: the store, the origin, and the fallback pages
///
/// Cheap to clone; the stale-while-revalidate background task takes its own
/// copy of the store and upstream handles.
#[derive(Clone)]
pub struct StrategyContext {
    pub store: Arc<dyn CacheStore>,
    pub upstream: Arc<dyn Upstream>,
    pub generation: String,
    pub offline_path: String,
    pub home_path: String,
}

/// Cached entry for this request, else offline page, else home page;
/// first hit wins. An empty 503 when nothing was ever cached.
async fn fallback_chain(
    ctx: &StrategyContext,
    key: Option<&RequestKey>,
) -> Result<StoredResponse, CacheError> {
    if let Some(key) = key {
        if let Some(hit) = ctx.store.get(&ctx.generation, key).await? {
            return Ok(hit);
        }
    }

    for path in [&ctx.offline_path, &ctx.home_path] {
        let key = RequestKey::get(path);
        if let Some(hit) = ctx.store.get(&ctx.generation, &key).await? {
            return Ok(hit);
        }
    }

    Ok(StoredResponse::empty(
        StatusCode::SERVICE_UNAVAILABLE.as_u16(),
    ))
}

/// Network-first, for ordinary HTML pages
///
/// Fresh content when the origin answers (a copy is stored for later),
/// cached content otherwise.
pub async fn network_first(
    ctx: &StrategyContext,
    key: &RequestKey,
) -> Result<StoredResponse, CacheError> {
    match ctx.upstream.fetch(&key.path, false).await {
        Ok(fresh) => {
            if let Err(e) = ctx.store.put(&ctx.generation, key, &fresh).await {
                warn!("Failed to cache {}: {}", key.path, e);
            }
            Ok(fresh)
        }
        Err(e) => {
            debug!("Network fetch failed for {}: {}", key.path, e);
            fallback_chain(ctx, Some(key)).await
        }
    }
}

/// Cache-first, for images
///
/// A cached copy is served without any network call. A never-cached image
/// that cannot be fetched resolves as an empty 504 and fails silently on
/// the page; no placeholder is substituted.
pub async fn cache_first(
    ctx: &StrategyContext,
    key: &RequestKey,
) -> Result<StoredResponse, CacheError> {
    if let Some(hit) = ctx.store.get(&ctx.generation, key).await? {
        return Ok(hit);
    }

    match ctx.upstream.fetch(&key.path, false).await {
        Ok(fresh) => {
            if let Err(e) = ctx.store.put(&ctx.generation, key, &fresh).await {
                warn!("Failed to cache {}: {}", key.path, e);
            }
            Ok(fresh)
        }
        Err(e) => {
            debug!("Network fetch failed for uncached {}: {}", key.path, e);
            Ok(StoredResponse::empty(StatusCode::GATEWAY_TIMEOUT.as_u16()))
        }
    }
}

/// Stale-while-revalidate, for CSS/JS/fonts and other resources
///
/// The cached copy is returned immediately while a detached task refreshes
/// the entry; the request path never waits on the refresh. On a cache miss
/// the network result itself is served.
pub async fn stale_while_revalidate(
    ctx: &StrategyContext,
    key: &RequestKey,
) -> Result<StoredResponse, CacheError> {
    let cached = ctx.store.get(&ctx.generation, key).await?;

    let store = Arc::clone(&ctx.store);
    let upstream = Arc::clone(&ctx.upstream);
    let generation = ctx.generation.clone();
    let task_key = key.clone();
    let revalidation = tokio::spawn(async move {
        match upstream.fetch(&task_key.path, false).await {
            Ok(fresh) => {
                if let Err(e) = store.put(&generation, &task_key, &fresh).await {
                    warn!("Failed to store revalidated {}: {}", task_key.path, e);
                }
                Some(fresh)
            }
            Err(e) => {
                debug!("Revalidation failed for {}: {}", task_key.path, e);
                None
            }
        }
    });

    if let Some(hit) = cached {
        // The revalidation task keeps running detached; its outcome only
        // affects future requests.
        return Ok(hit);
    }

    match revalidation.await {
        Ok(Some(fresh)) => Ok(fresh),
        Ok(None) => Ok(StoredResponse::empty(StatusCode::GATEWAY_TIMEOUT.as_u16())),
        Err(e) => Err(CacheError::Upstream(format!(
            "revalidation task failed: {}",
            e
        ))),
    }
}

/// Network-only with offline fallback, for sensitive HTML pages
///
/// The fetch bypasses intermediate HTTP caches and the response is never
/// stored, so a stale authenticated (or unauthenticated) shell can never be
/// replayed to the wrong user.
pub async fn network_only_with_fallback(
    ctx: &StrategyContext,
    key: &RequestKey,
) -> Result<StoredResponse, CacheError> {
    match ctx.upstream.fetch(&key.path, true).await {
        Ok(fresh) => Ok(fresh),
        Err(e) => {
            debug!("Network fetch failed for sensitive {}: {}", key.path, e);
            fallback_chain(ctx, None).await
        }
    }
}
