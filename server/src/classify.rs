//! Request classification: which caching strategy applies to which request

use crate::cache::CacheError;
use axum::http::{HeaderMap, Method, Uri, header};

/// Category assigned to an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Not intercepted at all: non-GET or cross-origin, forwarded verbatim
    Passthrough,
    /// HTML page that must always come fresh from the network
    SensitiveHtml,
    /// Ordinary HTML page (network-first)
    Html,
    /// Image (cache-first)
    Image,
    /// Everything else: CSS, JS, fonts, manifest (stale-while-revalidate)
    Other,
}

/// Suffix matcher for pages that must bypass caching entirely
///
/// Suffix rather than exact match, so a deployment under a subdirectory
/// (`/site/login.html`) is handled the same as one at the root.
#[derive(Debug, Clone)]
pub struct SensitivePaths {
    suffixes: Vec<String>,
}

impl SensitivePaths {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.suffixes.iter().any(|suffix| path.ends_with(suffix))
    }
}

/// Classifies incoming requests against the service's own origin
#[derive(Debug, Clone)]
pub struct Classifier {
    /// host[:port] of the gateway's own origin
    origin_authority: String,
    sensitive: SensitivePaths,
}

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "svg", "ico"];

fn has_image_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl Classifier {
    /// Build a classifier for the configured origin and sensitive suffixes
    pub fn new(origin: &str, sensitive_suffixes: Vec<String>) -> Result<Self, CacheError> {
        let parsed = url::Url::parse(origin)
            .map_err(|e| CacheError::InvalidUrl(format!("Failed to parse origin: {}", e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CacheError::InvalidUrl(format!("Origin has no host: {}", origin)))?;
        let origin_authority = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            origin_authority,
            sensitive: SensitivePaths::new(sensitive_suffixes),
        })
    }

    /// Assign a request to its category
    ///
    /// Only same-origin GETs are intercepted; everything else is
    /// `Passthrough` and never reaches the cache store.
    pub fn classify(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> RequestClass {
        if method != Method::GET {
            return RequestClass::Passthrough;
        }

        // Absolute-form URIs (or HTTP/2 :authority) carry the target origin
        // directly; otherwise the Host header names it.
        let authority = uri
            .authority()
            .map(|a| a.as_str())
            .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()));
        if let Some(authority) = authority {
            if authority != self.origin_authority {
                return RequestClass::Passthrough;
            }
        }

        let path = uri.path();
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if accept.contains("text/html") {
            if self.sensitive.matches(path) {
                RequestClass::SensitiveHtml
            } else {
                RequestClass::Html
            }
        } else if headers
            .get("sec-fetch-dest")
            .and_then(|h| h.to_str().ok())
            .map(|dest| dest == "image")
            .unwrap_or(false)
            || has_image_extension(path)
        {
            RequestClass::Image
        } else {
            RequestClass::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn classifier() -> Classifier {
        Classifier::new(
            "http://site.example:8080",
            vec![
                "/login.html".to_string(),
                "/perguntas.html".to_string(),
                "/selecao-produtos.html".to_string(),
            ],
        )
        .unwrap()
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_non_get_is_passthrough() {
        let c = classifier();
        let uri: Uri = "/login.html".parse().unwrap();
        let h = headers(&[("host", "site.example:8080"), ("accept", "text/html")]);
        assert_eq!(c.classify(&Method::POST, &uri, &h), RequestClass::Passthrough);
    }

    #[test]
    fn test_cross_origin_is_passthrough() {
        let c = classifier();
        let uri: Uri = "/analytics.js".parse().unwrap();
        let h = headers(&[("host", "tracker.example")]);
        assert_eq!(c.classify(&Method::GET, &uri, &h), RequestClass::Passthrough);

        let absolute: Uri = "http://tracker.example/pixel.gif".parse().unwrap();
        let h = headers(&[]);
        assert_eq!(
            c.classify(&Method::GET, &absolute, &h),
            RequestClass::Passthrough
        );
    }

    #[test]
    fn test_html_by_accept_header() {
        let c = classifier();
        let uri: Uri = "/tratamento.html".parse().unwrap();
        let h = headers(&[
            ("host", "site.example:8080"),
            ("accept", "text/html,application/xhtml+xml"),
        ]);
        assert_eq!(c.classify(&Method::GET, &uri, &h), RequestClass::Html);
    }

    #[test]
    fn test_sensitive_html_by_suffix() {
        let c = classifier();
        let h = headers(&[("host", "site.example:8080"), ("accept", "text/html")]);

        for path in ["/login.html", "/app/login.html", "/selecao-produtos.html"] {
            let uri: Uri = path.parse().unwrap();
            assert_eq!(
                c.classify(&Method::GET, &uri, &h),
                RequestClass::SensitiveHtml,
                "{path} should be sensitive"
            );
        }
    }

    #[test]
    fn test_image_by_destination_and_extension() {
        let c = classifier();
        let h = headers(&[
            ("host", "site.example:8080"),
            ("accept", "*/*"),
            ("sec-fetch-dest", "image"),
        ]);
        let uri: Uri = "/dynamic-image".parse().unwrap();
        assert_eq!(c.classify(&Method::GET, &uri, &h), RequestClass::Image);

        let h = headers(&[("host", "site.example:8080"), ("accept", "*/*")]);
        let uri: Uri = "/lesao.png".parse().unwrap();
        assert_eq!(c.classify(&Method::GET, &uri, &h), RequestClass::Image);
    }

    #[test]
    fn test_other_resources() {
        let c = classifier();
        let h = headers(&[("host", "site.example:8080"), ("accept", "text/css,*/*")]);
        let uri: Uri = "/style.css".parse().unwrap();
        assert_eq!(c.classify(&Method::GET, &uri, &h), RequestClass::Other);
    }

    #[test]
    fn test_suffix_match_is_not_exact_match() {
        let sensitive = SensitivePaths::new(vec!["/premium.html".to_string()]);
        assert!(sensitive.matches("/premium.html"));
        assert!(sensitive.matches("/subdir/premium.html"));
        assert!(!sensitive.matches("/premium.html.bak"));
        assert!(!sensitive.matches("/index.html"));
    }
}
