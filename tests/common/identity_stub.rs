// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process stand-in for the Identity Toolkit REST API, served on a local
//! port and reached through `FirebaseAuth::emulator`.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct IdentityStub {
    /// uid -> account record in `accounts:lookup` shape
    users: DashMap<String, Value>,
    next_uid: AtomicU64,
}

impl IdentityStub {
    /// Serve a fresh stub; returns it with the `host:port` it listens on.
    pub async fn start() -> (Arc<Self>, String) {
        let stub = Arc::new(Self::default());
        let router = Router::new()
            .route(
                "/identitytoolkit.googleapis.com/v1/projects/{project}/{operation}",
                post(handle),
            )
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        (stub, host)
    }

    /// Add an account directly, as if created by a client SDK.
    pub fn seed(&self, uid: &str, email: &str, display_name: &str) {
        self.users.insert(uid.to_string(), account(uid, email, display_name));
    }

    pub fn user(&self, uid: &str) -> Option<Value> {
        self.users.get(uid).map(|u| u.clone())
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users.iter().any(|u| u["email"] == email)
    }
}

fn account(uid: &str, email: &str, display_name: &str) -> Value {
    json!({
        "localId": uid,
        "email": email,
        "displayName": display_name,
        "createdAt": chrono::Utc::now().timestamp_millis().to_string(),
        "providerUserInfo": [{ "providerId": "password" }],
    })
}

fn provider_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": 400, "message": message } })),
    )
}

async fn handle(
    State(stub): State<Arc<IdentityStub>>,
    Path((_project, operation)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let local_id = body["localId"].as_str().unwrap_or_default().to_string();

    match operation.as_str() {
        "accounts" => {
            let email = body["email"].as_str().unwrap_or_default();
            if stub.email_taken(email) {
                return provider_error("EMAIL_EXISTS");
            }
            let uid = format!("stub-uid-{}", stub.next_uid.fetch_add(1, Ordering::SeqCst));
            let display_name = body["displayName"].as_str().unwrap_or_default();
            stub.seed(&uid, email, display_name);
            (
                StatusCode::OK,
                Json(json!({ "localId": uid, "email": email, "displayName": display_name })),
            )
        }
        "accounts:lookup" => {
            let uid = body["localId"][0].as_str().unwrap_or_default();
            match stub.user(uid) {
                Some(user) => (StatusCode::OK, Json(json!({ "users": [user] }))),
                None => (StatusCode::OK, Json(json!({}))),
            }
        }
        "accounts:update" => {
            let Some(mut user) = stub.users.get_mut(&local_id) else {
                return provider_error("USER_NOT_FOUND");
            };
            for field in ["displayName", "photoUrl"] {
                if let Some(value) = body.get(field) {
                    user[field] = value.clone();
                }
            }
            (StatusCode::OK, Json(json!({ "localId": local_id })))
        }
        "accounts:delete" => match stub.users.remove(&local_id) {
            Some(_) => (StatusCode::OK, Json(json!({}))),
            None => provider_error("USER_NOT_FOUND"),
        },
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": 404, "message": "NOT_FOUND" } })),
        ),
    }
}
