// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notify-Vital: health-metric tracking backend
//!
//! Two auth surfaces share one server: locally issued session tokens backed
//! by Postgres for the health-metric API, and Firebase-federated identities
//! whose profiles are mirrored in Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{IdTokenVerifier, LocalAuthService, ProfileService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub local_auth: LocalAuthService,
    pub id_tokens: Arc<IdTokenVerifier>,
    pub profiles: ProfileService,
}
