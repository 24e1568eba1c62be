// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development. Everything is read once
//! at startup; handlers only ever see the resulting [`Config`].

use crate::time_utils::parse_duration;
use chrono::Duration;
use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Deployment environment (`development`, `production`, ...)
    pub environment: String,
    /// Origins allowed by CORS. Empty means "mirror the request origin".
    pub cors_allowed_origins: Vec<String>,

    // --- Token-issuing surface ---
    /// HMAC secret for session tokens (raw bytes, never empty)
    pub jwt_secret: Vec<u8>,
    /// Lifetime of issued session tokens
    pub jwt_expiry: Duration,
    /// Postgres connection string; `None` runs on the in-process store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// How long invalid/expired session rows are kept after expiry
    pub session_retention: Duration,
    /// How often the session purge runs
    pub session_cleanup_interval: Duration,

    // --- Federated surface ---
    /// Firebase / GCP project ID
    pub firebase_project_id: Option<String>,
    /// Path to the Firebase service-account JSON
    pub firebase_credentials_file: PathBuf,
    /// Firebase Auth emulator host (`localhost:9099`)
    pub firebase_auth_emulator_host: Option<String>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            environment: "test".to_string(),
            cors_allowed_origins: vec![],
            jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
            jwt_expiry: Duration::hours(24),
            database_url: None,
            db_max_connections: 5,
            db_min_connections: 1,
            session_retention: Duration::hours(720),
            session_cleanup_interval: Duration::hours(1),
            firebase_project_id: Some("test-project".to_string()),
            firebase_credentials_file: PathBuf::from("./config/firebase-credentials.json"),
            firebase_auth_emulator_host: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = env::var("JWT_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment: env::var("ENV").unwrap_or_else(|_| "development".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret: jwt_secret.into_bytes(),
            jwt_expiry: duration_var("JWT_EXPIRY", "24h")?,
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            db_min_connections: env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            session_retention: duration_var("SESSION_RETENTION", "720h")?,
            session_cleanup_interval: duration_var("SESSION_CLEANUP_INTERVAL", "1h")?,

            firebase_project_id: non_empty_var("FIREBASE_PROJECT_ID")
                .or_else(|| non_empty_var("GCP_PROJECT_ID")),
            firebase_credentials_file: env::var("FIREBASE_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./config/firebase-credentials.json")),
            firebase_auth_emulator_host: non_empty_var("FIREBASE_AUTH_EMULATOR_HOST"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn duration_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match parse_duration(&raw) {
        Some(d) if d > Duration::zero() => Ok(d),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
