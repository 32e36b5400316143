//! Upstream origin client for fetching and forwarding site traffic

use crate::cache::{CacheError, StoredResponse};
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Response headers worth carrying into the cache and back to the page
const KEPT_HEADERS: [&str; 3] = ["content-type", "cache-control", "location"];

/// Trait for reaching the site's real origin
///
/// This abstraction keeps the strategies and the generation lifecycle
/// testable without a network; the production implementation is reqwest.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// GET a path from the origin
    ///
    /// With `bypass_http_cache` set, the request carries `Cache-Control:
    /// no-cache` so no intermediate HTTP cache may satisfy it (the
    /// force-reload used for installs and sensitive pages). Transport
    /// failures are errors; HTTP error statuses are returned as responses.
    async fn fetch(&self, path: &str, bypass_http_cache: bool)
    -> Result<StoredResponse, CacheError>;

    /// Forward a request verbatim, outside the caching pipeline
    ///
    /// Used for non-GET and cross-origin traffic, which is never classified
    /// and never touches the cache store.
    async fn forward(
        &self,
        method: &str,
        path_and_query: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<StoredResponse, CacheError>;
}

/// HTTP implementation of Upstream against a configured base URL
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    /// Create an upstream client for `base_url` (e.g. "http://127.0.0.1:9000")
    pub fn new(base_url: &str) -> Result<Self, CacheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CacheError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_response(response: reqwest::Response) -> Result<StoredResponse, CacheError> {
        let status = response.status().as_u16();

        let mut headers = Vec::new();
        for name in KEPT_HEADERS {
            if let Some(value) = response.headers().get(name).and_then(|h| h.to_str().ok()) {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?
            .to_vec();

        Ok(StoredResponse {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(
        &self,
        path: &str,
        bypass_http_cache: bool,
    ) -> Result<StoredResponse, CacheError> {
        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if bypass_http_cache {
            request = request
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .header(reqwest::header::PRAGMA, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?;

        debug!("Fetched {} -> {}", url, response.status());
        Self::read_response(response).await
    }

    async fn forward(
        &self,
        method: &str,
        path_and_query: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<StoredResponse, CacheError> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| CacheError::Upstream(e.to_string()))?;
        let url = self.url_for(path_and_query);

        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            // The client sets its own host and length headers
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?;

        debug!("Forwarded {} -> {}", url, response.status());
        Self::read_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_paths() {
        let upstream = HttpUpstream::new("http://127.0.0.1:9000/").unwrap();
        assert_eq!(
            upstream.url_for("/index.html"),
            "http://127.0.0.1:9000/index.html"
        );
    }

    #[tokio::test]
    async fn test_fetch_unreachable_origin_is_an_error() {
        // Nothing listens on port 1, the connection is refused immediately
        let upstream = HttpUpstream::new("http://127.0.0.1:1").unwrap();
        let result = upstream.fetch("/index.html", false).await;
        assert!(matches!(result, Err(CacheError::Upstream(_))));
    }
}
