// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use notify_vital::config::Config;
use notify_vital::db::{Database, FirestoreDb, MemoryMirror, MemoryStore};
use notify_vital::routes::create_router;
use notify_vital::services::{
    FirebaseAuth, IdTokenVerifier, LocalAuthService, ProfileService, TokenService,
};
use notify_vital::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub mod identity_stub;
use identity_stub::IdentityStub;

pub const TEST_PROJECT: &str = "test-project";
pub const TEST_KID: &str = "test-kid";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Router plus handles on the shared state for assertions.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

/// Create a test app with offline mock dependencies: in-process relational
/// store, offline Firestore and identity provider, static-key ID tokens.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    build_app(ProfileService::new(
        Arc::new(FirebaseAuth::offline(TEST_PROJECT)),
        FirestoreDb::new_mock(),
    ))
}

/// A test app whose federated side talks to a local identity stub and an
/// in-process profile mirror.
#[allow(dead_code)]
pub struct FederatedApp {
    pub app: TestApp,
    pub provider: Arc<IdentityStub>,
    pub mirror: Arc<MemoryMirror>,
}

#[allow(dead_code)]
pub async fn create_federated_app() -> FederatedApp {
    let (provider, host) = IdentityStub::start().await;
    let mirror = Arc::new(MemoryMirror::new());

    let auth = FirebaseAuth::emulator(TEST_PROJECT, &host).unwrap();
    let app = build_app(ProfileService::new(
        Arc::new(auth),
        FirestoreDb::with_memory_mirror(mirror.clone()),
    ));

    FederatedApp {
        app,
        provider,
        mirror,
    }
}

#[allow(dead_code)]
fn build_app(profiles: ProfileService) -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_memory_store(store.clone());

    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.jwt_expiry).unwrap());
    let local_auth = LocalAuthService::new(db.clone(), tokens);

    let public_key =
        DecodingKey::from_rsa_pem(include_bytes!("../fixtures/test_rsa_public.pem")).unwrap();
    let id_tokens =
        Arc::new(IdTokenVerifier::new_with_static_key(TEST_PROJECT, TEST_KID, public_key).unwrap());

    let state = Arc::new(AppState {
        config,
        db,
        local_auth,
        id_tokens,
        profiles,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

/// Mint a Firebase-style ID token signed with the fixture key.
#[allow(dead_code)]
pub fn firebase_id_token(uid: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "iss": format!("https://securetoken.google.com/{TEST_PROJECT}"),
        "aud": TEST_PROJECT,
        "sub": uid,
        "iat": now - 10,
        "exp": now + 3600,
        "email": format!("{uid}@example.com"),
    });

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key =
        EncodingKey::from_rsa_pem(include_bytes!("../fixtures/test_rsa_private.pem")).unwrap();
    encode(&header, &claims, &key).unwrap()
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and return status plus parsed JSON body (`Null` if empty).
#[allow(dead_code)]
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Register a user and return its session token.
#[allow(dead_code)]
pub async fn register(app: &TestApp, username: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": username, "email": email, "password": "secret123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["token"].as_str().unwrap().to_string()
}
