//! Bearer-token auth and per-actor rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::Mutex;

use crate::api::AppState;
use crate::types::ErrorResponse;

/// The authenticated actor, inserted into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct Actor(pub String);

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
            code: None,
            details: None,
        }),
    )
        .into_response()
}

/// Validates `Authorization: Bearer <token>` and resolves the actor.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(header) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized("missing authorization header");
    };

    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return unauthorized("invalid authorization format");
    }

    let Some(actor) = state.config.actor_from_token(token) else {
        return unauthorized("invalid token");
    };

    request.extensions_mut().insert(Actor(actor.to_string()));
    next.run(request).await
}

/// Sliding-window request counter, keyed by actor.
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// True when the request should be allowed; records it if so.
    pub async fn allow(&self, key: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        let cutoff = now - self.window;

        let entry = requests.entry(key.to_string()).or_default();
        entry.retain(|t| *t > cutoff);

        if entry.len() >= self.limit {
            return false;
        }
        entry.push(now);
        true
    }
}

/// Enforces the per-actor request budget (60/min by default).
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<Actor>()
        .map(|a| a.0.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    if !state.rate_limiter.allow(&key).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(axum::http::header::RETRY_AFTER, "60")],
            Json(ErrorResponse {
                error: "rate limit exceeded".to_string(),
                code: Some("RATE_LIMIT".to_string()),
                details: None,
            }),
        )
            .into_response();
    }

    next.run(request).await
}
