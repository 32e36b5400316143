use crate::AppState;
use crate::cache::{RequestKey, StoredResponse};
use crate::classify::RequestClass;
use crate::strategy;
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

pub fn create_app(state: AppState) -> Router {
    // Every request goes through the classifier, so the router has a single
    // intercepting fallback rather than per-path routes.
    Router::new().fallback(handle_request).with_state(state)
}

async fn handle_request(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let class = state
        .classifier
        .classify(&parts.method, &parts.uri, &parts.headers);

    if class == RequestClass::Passthrough {
        return passthrough(&state, parts, body).await;
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let key = RequestKey::get(path_and_query);
    debug!("Handling {} as {:?}", key.path, class);

    let ctx = state.strategy_context();
    let result = match class {
        RequestClass::Html => strategy::network_first(&ctx, &key).await,
        RequestClass::Image => strategy::cache_first(&ctx, &key).await,
        RequestClass::Other => strategy::stale_while_revalidate(&ctx, &key).await,
        RequestClass::SensitiveHtml => strategy::network_only_with_fallback(&ctx, &key).await,
        RequestClass::Passthrough => unreachable!("handled above"),
    };

    match result {
        Ok(stored) => stored_response(stored),
        Err(e) => {
            error!("Strategy failed for {}: {}", key.path, e);
            (StatusCode::BAD_GATEWAY, "upstream and cache unavailable").into_response()
        }
    }
}

/// Forward a non-intercepted request verbatim, with no cache interaction
async fn passthrough(state: &AppState, parts: Parts, body: Body) -> Response {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            error!("Failed to read passthrough body: {}", e);
            return (StatusCode::BAD_REQUEST, "unreadable request body").into_response();
        }
    };

    match state
        .upstream
        .forward(parts.method.as_str(), &path_and_query, &headers, body)
        .await
    {
        Ok(stored) => stored_response(stored),
        Err(e) => {
            error!("Passthrough failed for {}: {}", path_and_query, e);
            (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
        }
    }
}

fn stored_response(stored: StoredResponse) -> Response {
    // A status outside the valid range means the stored row is corrupt;
    // it must not pass itself off as a success.
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = status;
    for (name, value) in &stored.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!("Skipping unrepresentable stored header {}", name),
        }
    }
    response
}
