// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.
//!
//! Two families share one [`Identity`] type: local HS256 session tokens and
//! Firebase ID tokens. The `require_*` variants reject with 401; the
//! `optional_*` variants never reject.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated principal attached to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Relational user id from a local session token
    Local(i64),
    /// Firebase uid from a verified ID token
    Federated(String),
}

impl Identity {
    /// The local user id, or 401 for a federated identity.
    pub fn local_user_id(&self) -> Result<i64, AppError> {
        match self {
            Identity::Local(user_id) => Ok(*user_id),
            Identity::Federated(_) => Err(AppError::Unauthorized),
        }
    }

    /// The Firebase uid, or 401 for a local identity.
    pub fn federated_uid(&self) -> Result<&str, AppError> {
        match self {
            Identity::Federated(uid) => Ok(uid),
            Identity::Local(_) => Err(AppError::Unauthorized),
        }
    }
}

/// Extract `<token>` from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware that requires a valid local session token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let user_id = state.local_auth.authenticate(token).await?;

    request.extensions_mut().insert(Identity::Local(user_id));

    Ok(next.run(request).await)
}

/// Attach a local identity when a valid token is present; never rejects.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match state.local_auth.authenticate(token).await {
            Ok(user_id) => {
                request.extensions_mut().insert(Identity::Local(user_id));
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid optional token"),
        }
    }

    next.run(request).await
}

/// Middleware that requires a valid Firebase ID token.
pub async fn require_firebase_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let identity = state.id_tokens.verify(token).await.map_err(|e| {
        tracing::info!(error = %e, "ID token rejected");
        AppError::Unauthorized
    })?;

    request
        .extensions_mut()
        .insert(Identity::Federated(identity.uid));

    Ok(next.run(request).await)
}

/// Attach a federated identity when a valid ID token is present; never rejects.
pub async fn optional_firebase_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match state.id_tokens.verify(token).await {
            Ok(identity) => {
                request
                    .extensions_mut()
                    .insert(Identity::Federated(identity.uid));
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid optional ID token"),
        }
    }

    next.run(request).await
}
