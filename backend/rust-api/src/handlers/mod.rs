use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod quiz;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.store.backend().clone();
    let kind = backend.kind();

    let storage_health = match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        tokio::task::spawn_blocking(move || backend.ping()),
    )
    .await
    {
        Ok(Ok(Ok(()))) => json!({ "status": "healthy", "backend": kind }),
        Ok(Ok(Err(e))) => json!({
            "status": "unhealthy",
            "backend": kind,
            "error": e.to_string()
        }),
        Ok(Err(e)) => json!({
            "status": "unhealthy",
            "backend": kind,
            "error": format!("Health probe failed: {}", e)
        }),
        Err(_) => json!({
            "status": "unhealthy",
            "backend": kind,
            "error": "Storage timeout after 500ms"
        }),
    };

    let healthy = storage_health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    let (status, status_code) = if healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "mastery-quiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "storage": storage_health }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects `/metrics` with HTTP Basic Auth against `metrics_auth`
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state
        .config
        .metrics_auth
        .as_deref()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
