// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relational store for the token surface: users, sessions and health metrics.
//!
//! Backed by Postgres when `DATABASE_URL` is set, otherwise by an in-process
//! [`MemoryStore`].

use crate::config::Config;
use crate::db::memory::MemoryStore;
use crate::error::AppError;
use crate::models::user::{NewSession, NewUser, User};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum Backend {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

/// Relational database handle. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    pub(crate) backend: Backend,
}

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, created_at, last_login, is_active";

impl Database {
    /// Connect using the configured URL and run migrations, or fall back to
    /// the in-process store when no URL is configured.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!(
                "DATABASE_URL not set, running with in-memory store. \
                 State will not survive restarts."
            );
            return Ok(Self::in_memory());
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .min_connections(config.db_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(url)
            .await?;

        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    pub fn in_memory() -> Self {
        Self::with_memory_store(Arc::new(MemoryStore::new()))
    }

    /// Share an existing in-process store (tests inspect it directly).
    pub fn with_memory_store(store: Arc<MemoryStore>) -> Self {
        Self {
            backend: Backend::Memory(store),
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Insert a user. A duplicate email yields [`AppError::Conflict`].
    pub async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO users (username, email, password_hash, created_at, is_active) \
                     VALUES ($1, $2, $3, $4, TRUE) \
                     RETURNING {USER_COLUMNS}"
                );
                let user = sqlx::query_as::<_, User>(&sql)
                    .bind(&new.username)
                    .bind(&new.email)
                    .bind(&new.password_hash)
                    .bind(new.created_at)
                    .fetch_one(pool)
                    .await?;
                Ok(user)
            }
            Backend::Memory(store) => store.create_user(new),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
                Ok(sqlx::query_as::<_, User>(&sql)
                    .bind(email)
                    .fetch_optional(pool)
                    .await?)
            }
            Backend::Memory(store) => Ok(store.find_user_by_email(email)),
        }
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
                Ok(sqlx::query_as::<_, User>(&sql)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await?)
            }
            Backend::Memory(store) => Ok(store.find_user_by_id(user_id)),
        }
    }

    pub async fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE users SET last_login = $1 WHERE user_id = $2")
                    .bind(at)
                    .bind(user_id)
                    .execute(pool)
                    .await?;
            }
            Backend::Memory(store) => store.touch_last_login(user_id, at),
        }
        Ok(())
    }

    // ─── Session Operations ──────────────────────────────────────

    pub async fn insert_session(&self, new: NewSession) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO sessions (user_id, token_hash, ip_address, issued_at, expires_at, is_valid)
                    VALUES ($1, $2, $3, $4, $5, TRUE)
                    "#,
                )
                .bind(new.user_id)
                .bind(&new.token_hash)
                .bind(&new.ip_address)
                .bind(new.issued_at)
                .bind(new.expires_at)
                .execute(pool)
                .await?;
                Ok(())
            }
            Backend::Memory(store) => store.insert_session(new),
        }
    }

    /// Mark the session for `token_hash` invalid. Returns rows changed.
    pub async fn invalidate_session(&self, token_hash: &str) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query(
                "UPDATE sessions SET is_valid = FALSE WHERE token_hash = $1 AND is_valid",
            )
            .bind(token_hash)
            .execute(pool)
            .await?
            .rows_affected()),
            Backend::Memory(store) => Ok(store.invalidate_session(token_hash)),
        }
    }

    /// True only when a session row exists and has been invalidated.
    pub async fn session_revoked(&self, token_hash: &str) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let revoked: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM sessions WHERE token_hash = $1 AND NOT is_valid)",
                )
                .bind(token_hash)
                .fetch_one(pool)
                .await?;
                Ok(revoked)
            }
            Backend::Memory(store) => Ok(store.session_revoked(token_hash)),
        }
    }

    /// Delete sessions that expired before `expired_before`.
    pub async fn purge_sessions(&self, expired_before: DateTime<Utc>) -> Result<u64, AppError> {
        let deleted = match &self.backend {
            Backend::Postgres(pool) => sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
                .bind(expired_before)
                .execute(pool)
                .await?
                .rows_affected(),
            Backend::Memory(store) => store.purge_sessions(expired_before),
        };

        if deleted > 0 {
            tracing::info!(sessions_deleted = deleted, "Purged expired sessions");
        }
        Ok(deleted)
    }
}
