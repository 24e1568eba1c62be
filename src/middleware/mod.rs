// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod auth;

pub use auth::{
    optional_auth, optional_firebase_auth, require_auth, require_firebase_auth, Identity,
};
