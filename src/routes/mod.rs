pub mod api;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::state::AppState;

/// Build the complete application: routes, state, CORS and security headers.
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors_layer = cors_layer(state.config.cors_allowed_origins.as_deref());

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    api::create_api_router()
        .merge(voice::create_voice_router())
        .with_state(state)
        .layer(cors_layer)
        .layer(security_headers)
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            base
        }
    }
}
