// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Federated-identity routes (`/api/v1/*`).

use crate::error::Result;
use crate::middleware::auth::Identity;
use crate::models::profile::{SignUpRequest, UpdateProfileRequest};
use crate::models::UserProfile;
use crate::routes::extract::validated_json;
use crate::services::SignUpOutcome;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Public federated routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/auth/signup", post(sign_up))
        .route("/api/v1/auth/signin", post(sign_in))
}

/// Routes that require a Firebase ID token.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/profile", get(get_profile).put(update_profile))
        .route("/api/v1/account", delete(delete_account))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Response> {
    let req = validated_json(body)?;

    let response = match state.profiles.sign_up(req).await? {
        SignUpOutcome::Complete(body) => (StatusCode::CREATED, Json(body)).into_response(),
        SignUpOutcome::Partial { message, uid } => (
            StatusCode::CREATED,
            Json(json!({ "message": message, "uid": uid })),
        )
            .into_response(),
    };
    Ok(response)
}

/// Password sign-in happens client-side with the Firebase SDK.
async fn sign_in() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Sign-in should be handled on the client side with Firebase Authentication SDK"
    }))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserProfile>> {
    let profile = state.profiles.get_profile(identity.federated_uid()?).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let update = validated_json(body)?;
    let profile = state
        .profiles
        .update_profile(identity.federated_uid()?, &update)
        .await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": profile,
    })))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<serde_json::Value>> {
    state
        .profiles
        .delete_account(identity.federated_uid()?)
        .await?;
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}
