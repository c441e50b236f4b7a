use axum::{Json, response::Html};
use serde::Serialize;

/// Reference browser client served at `/`.
const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Health check handler
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "voice-live-api-bridge",
    })
}

/// Serve the reference browser client
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
