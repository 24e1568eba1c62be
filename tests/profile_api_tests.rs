// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Federated profile route tests.
//!
//! The first group runs with offline dependencies that fail every call and
//! covers authentication, validation and error mapping. The second group
//! drives a local identity stub and an in-process mirror whose writes can be
//! switched off, covering the best-effort branches.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

mod common;
use common::{
    create_federated_app, create_test_app, firebase_id_token, register, request, send,
    FederatedApp,
};

#[tokio::test]
async fn test_profile_routes_require_id_token() {
    let app = create_test_app();

    for (method, uri) in [
        (Method::GET, "/api/v1/profile"),
        (Method::PUT, "/api/v1/profile"),
        (Method::DELETE, "/api/v1/account"),
    ] {
        let (status, body) = send(&app, request(method.clone(), uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_session_token_is_not_an_id_token() {
    let app = create_test_app();
    let session_token = register(&app, "alice", "alice@example.com").await;

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/profile", Some(&session_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_id_token_reaches_handler() {
    let app = create_test_app();
    let token = firebase_id_token("uid-alice");

    // Offline mirror: the handler runs and the store failure surfaces as 500
    let (status, body) = send(&app, request(Method::GET, "/api/v1/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());

    // Offline provider
    let (status, body) = send(
        &app,
        request(Method::DELETE, "/api/v1/account", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "identity_provider_error");
}

#[tokio::test]
async fn test_update_profile_validates_before_side_effects() {
    let app = create_test_app();
    let token = firebase_id_token("uid-bob");

    for bad in [
        json!({ "height": 0 }),
        json!({ "weight": -70.5 }),
        json!({ "gender": "robot" }),
        json!({ "photoURL": "not a url" }),
        json!({ "displayName": "" }),
    ] {
        let (status, body) = send(
            &app,
            request(Method::PUT, "/api/v1/profile", Some(&token), Some(bad.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}: {body}");
    }
}

#[tokio::test]
async fn test_sign_up_validation() {
    let app = create_test_app();

    for bad in [
        json!({ "email": "bad", "password": "secret123", "displayName": "Bob" }),
        json!({ "email": "bob@example.com", "password": "123", "displayName": "Bob" }),
        json!({ "email": "bob@example.com", "password": "secret123", "displayName": "" }),
        json!({ "email": "bob@example.com", "password": "secret123", "displayName": "Bob",
                "gender": "unknown" }),
        json!({ "email": "bob@example.com", "password": "secret123", "displayName": "Bob",
                "height": 0 }),
    ] {
        let (status, _) = send(
            &app,
            request(Method::POST, "/api/v1/auth/signup", None, Some(bad.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
    }
}

#[tokio::test]
async fn test_sign_up_with_provider_down() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({
                "email": "carol@example.com",
                "password": "secret123",
                "displayName": "Carol",
                "gender": "female",
                "height": 170.0,
                "weight": 60.0,
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "identity_provider_error");
}

#[tokio::test]
async fn test_sign_in_is_informational() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/auth/signin",
            None,
            Some(json!({ "email": "a@example.com", "password": "whatever" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Firebase Authentication SDK"));
}

// ═══════════════════════════════════════════════════════════════════════════
// SCRIPTED PROVIDER AND MIRROR
// ═══════════════════════════════════════════════════════════════════════════

async fn sign_up(fed: &FederatedApp, email: &str) -> (StatusCode, Value) {
    send(
        &fed.app,
        request(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({
                "email": email,
                "password": "secret123",
                "displayName": "Dana",
                "gender": "female",
                "height": 165.0,
            })),
        ),
    )
    .await
}

#[tokio::test]
async fn test_sign_up_then_read_profile() {
    let fed = create_federated_app().await;

    let (status, body) = sign_up(&fed, "Dana@Example.com").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["email"], "dana@example.com");
    assert_eq!(body["displayName"], "Dana");
    assert_eq!(body["expiresIn"], 3600);
    assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);

    let uid = body["uid"].as_str().unwrap();
    let mirrored = fed.mirror.profile(uid).expect("profile mirrored");
    assert_eq!(mirrored.height, Some(165.0));

    let token = firebase_id_token(uid);
    let (status, body) = send(&fed.app, request(Method::GET, "/api/v1/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], uid);
    assert_eq!(body["gender"], "female");
}

#[tokio::test]
async fn test_sign_up_duplicate_email_conflicts() {
    let fed = create_federated_app().await;
    let (status, _) = sign_up(&fed, "erin@example.com").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = sign_up(&fed, "erin@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_sign_up_with_mirror_down_is_partial_success() {
    let fed = create_federated_app().await;
    fed.mirror.set_fail_writes(true);

    let (status, body) = sign_up(&fed, "fay@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "User created successfully, but profile data storage failed"
    );
    assert!(body.get("token").is_none());

    let uid = body["uid"].as_str().unwrap();
    assert!(fed.provider.user(uid).is_some());
    assert!(fed.mirror.profile(uid).is_none());
}

#[tokio::test]
async fn test_get_profile_falls_back_to_provider_and_backfills() {
    let fed = create_federated_app().await;
    fed.provider.seed("uid-gus", "gus@example.com", "Gus");
    let token = firebase_id_token("uid-gus");

    let (status, body) = send(&fed.app, request(Method::GET, "/api/v1/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Gus");
    assert_eq!(body["provider"], "password");

    let backfilled = fed.mirror.profile("uid-gus").expect("mirror backfilled");
    assert_eq!(backfilled.email, "gus@example.com");
}

#[tokio::test]
async fn test_get_profile_backfill_failure_still_reads() {
    let fed = create_federated_app().await;
    fed.provider.seed("uid-hal", "hal@example.com", "Hal");
    fed.mirror.set_fail_writes(true);
    let token = firebase_id_token("uid-hal");

    let (status, body) = send(&fed.app, request(Method::GET, "/api/v1/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Hal");
    assert!(fed.mirror.profile("uid-hal").is_none());
}

#[tokio::test]
async fn test_get_profile_unknown_everywhere_is_not_found() {
    let fed = create_federated_app().await;
    let token = firebase_id_token("uid-nobody");

    let (status, body) = send(&fed.app, request(Method::GET, "/api/v1/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_update_profile_writes_provider_then_mirror() {
    let fed = create_federated_app().await;
    let (_, body) = sign_up(&fed, "ivy@example.com").await;
    let uid = body["uid"].as_str().unwrap().to_string();
    let token = firebase_id_token(&uid);

    let (status, body) = send(
        &fed.app,
        request(
            Method::PUT,
            "/api/v1/profile",
            Some(&token),
            Some(json!({ "displayName": "Ivy R.", "weight": 58.5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["displayName"], "Ivy R.");
    assert_eq!(body["user"]["height"], 165.0);

    assert_eq!(fed.provider.user(&uid).unwrap()["displayName"], "Ivy R.");
    assert_eq!(fed.mirror.profile(&uid).unwrap().weight, Some(58.5));
}

#[tokio::test]
async fn test_delete_account_survives_mirror_failure() {
    let fed = create_federated_app().await;
    let (_, body) = sign_up(&fed, "jo@example.com").await;
    let uid = body["uid"].as_str().unwrap().to_string();
    let token = firebase_id_token(&uid);

    fed.mirror.set_fail_writes(true);
    let (status, body) = send(&fed.app, request(Method::DELETE, "/api/v1/account", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted successfully");

    assert!(fed.provider.user(&uid).is_none());
    // The mirror document is left behind
    assert!(fed.mirror.profile(&uid).is_some());

    // A second delete finds no provider account
    let (status, _) = send(&fed.app, request(Method::DELETE, "/api/v1/account", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
