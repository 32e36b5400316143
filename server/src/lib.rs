pub mod cache;
pub mod classify;
pub mod config;
pub mod lifecycle;
pub mod server;
pub mod strategy;
pub mod upstream;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore, RequestKey, StoredResponse};
pub use classify::{Classifier, RequestClass};
pub use config::Config;
pub use upstream::{HttpUpstream, Upstream};

use std::sync::Arc;
use strategy::StrategyContext;

pub type AppState = Arc<GatewayState>;

pub struct GatewayState {
    pub config: Config,
    pub store: Arc<dyn CacheStore>,
    pub upstream: Arc<dyn Upstream>,
    pub classifier: Classifier,
}

impl GatewayState {
    pub fn new(
        config: Config,
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, CacheError> {
        let classifier = Classifier::new(&config.origin, config.sensitive_suffixes.clone())?;
        Ok(Self {
            config,
            store,
            upstream,
            classifier,
        })
    }

    /// Strategy view of the state, bound to the current generation
    pub fn strategy_context(&self) -> StrategyContext {
        StrategyContext {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
            generation: self.config.cache_version.clone(),
            offline_path: self.config.offline_path.clone(),
            home_path: self.config.home_path.clone(),
        }
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("config", &self.config)
            .field("store", &"<dyn CacheStore>")
            .field("upstream", &"<dyn Upstream>")
            .finish()
    }
}
