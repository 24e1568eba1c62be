// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token-issuing auth routes (`/api/auth/*`).

use crate::error::{AppError, Result};
use crate::middleware::auth::{bearer_token, Identity};
use crate::models::user::{AuthResponse, LoginRequest, MeResponse, RegisterRequest};
use crate::routes::extract::{validated_json, ClientIp};
use crate::services::local_auth::Authenticated;
use crate::time_utils::format_http_date;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Public auth routes. Logout checks its own bearer token so that a
/// repeated logout still succeeds.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

/// Auth routes that require a session token.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me", get(me))
}

fn auth_response(auth: Authenticated) -> AuthResponse {
    AuthResponse {
        token: auth.token.token,
        expires_at: format_http_date(auth.token.expires_at),
        user: auth.user,
    }
}

async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let req = validated_json(body)?;
    let auth = state.local_auth.register(req, ip).await?;
    Ok((StatusCode::CREATED, Json(auth_response(auth))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let req = validated_json(body)?;
    let auth = state.local_auth.login(req, ip).await?;
    Ok(Json(auth_response(auth)))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    state.local_auth.logout(token).await?;
    Ok(Json(json!({ "message": "Successfully logged out" })))
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<MeResponse>> {
    let user = state.local_auth.get_user(identity.local_user_id()?).await?;
    Ok(Json(MeResponse { user }))
}
