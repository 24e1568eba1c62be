// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod auth;
pub mod extract;
pub mod health;
pub mod profile;

use crate::config::Config;
use crate::middleware::auth::{require_auth, require_firebase_auth};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

/// Liveness check response
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        time: format_utc_rfc3339(chrono::Utc::now()),
    })
}

/// CORS policy: the configured origin list, or the request origin mirrored
/// outside production when no list is configured.
fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if !origins.is_empty() {
        AllowOrigin::list(origins)
    } else if config.is_production() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set in production, cross-origin requests denied");
        AllowOrigin::list(Vec::<HeaderValue>::new())
    } else {
        AllowOrigin::mirror_request()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(12 * 60 * 60))
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(profile::routes());

    // Session-token routes
    let local_routes = auth::protected_routes()
        .merge(health::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Firebase ID-token routes
    let federated_routes = profile::protected_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), require_firebase_auth),
    );

    Router::new()
        .merge(public_routes)
        .merge(local_routes)
        .merge(federated_routes)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
