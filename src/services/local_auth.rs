// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token-issuing auth service: registration, login, logout.

use crate::db::Database;
use crate::error::AppError;
use crate::models::user::{
    normalize_email, LoginRequest, NewSession, NewUser, RegisterRequest, User,
};
use crate::services::best_effort;
use crate::services::password::{hash_password, verify_dummy, verify_password};
use crate::services::token::{token_hash, IssuedToken, TokenError, TokenService};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// A user together with a freshly issued token.
#[derive(Debug)]
pub struct Authenticated {
    pub user: User,
    pub token: IssuedToken,
}

#[derive(Clone)]
pub struct LocalAuthService {
    db: Database,
    tokens: Arc<TokenService>,
}

impl LocalAuthService {
    pub fn new(db: Database, tokens: Arc<TokenService>) -> Self {
        Self { db, tokens }
    }

    /// Create an account and sign it in.
    pub async fn register(
        &self,
        req: RegisterRequest,
        ip_address: Option<String>,
    ) -> Result<Authenticated, AppError> {
        let password = req.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;

        let user = self
            .db
            .create_user(NewUser {
                username: req.username.trim().to_string(),
                email: normalize_email(&req.email),
                password_hash,
                created_at: Utc::now(),
            })
            .await?;

        let token = self.issue(user.user_id)?;
        self.record_session(&user, &token, ip_address, false).await;

        tracing::info!(user_id = user.user_id, "User registered");
        Ok(Authenticated { user, token })
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown email and wrong password both yield [`AppError::InvalidCredentials`].
    pub async fn login(
        &self,
        req: LoginRequest,
        ip_address: Option<String>,
    ) -> Result<Authenticated, AppError> {
        let email = normalize_email(&req.email);
        let found = self.db.find_user_by_email(&email).await?;

        // An unknown email still pays for a bcrypt check.
        let password = req.password;
        let stored_hash = found.as_ref().map(|u| u.password_hash.clone());
        let matches = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verify_password(&password, &hash),
            None => verify_dummy(&password),
        })
        .await
        .context("password verification task failed")?;

        let Some(mut user) = found else {
            tracing::debug!("Login for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !matches {
            tracing::debug!(user_id = user.user_id, "Login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::info!(user_id = user.user_id, "Login for inactive account");
            return Err(AppError::AccountInactive);
        }

        let token = self.issue(user.user_id)?;
        self.record_session(&user, &token, ip_address, true).await;
        user.last_login = Some(token.issued_at);

        tracing::info!(user_id = user.user_id, "User logged in");
        Ok(Authenticated { user, token })
    }

    /// Invalidate the session for `token`.
    ///
    /// The token must carry a valid signature and be unexpired, but it need
    /// not have a live session: repeated logouts succeed.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let user_id = self
            .tokens
            .validate(token)
            .map_err(|_| AppError::InvalidToken)?;

        let changed = self.db.invalidate_session(&token_hash(token)).await?;
        if changed == 0 {
            tracing::debug!(user_id, "Logout matched no active session");
        } else {
            tracing::info!(user_id, "User logged out");
        }
        Ok(())
    }

    /// Validate a bearer token and check it has not been logged out.
    pub async fn authenticate(&self, token: &str) -> Result<i64, AppError> {
        let user_id = self
            .tokens
            .validate(token)
            .map_err(|_| AppError::InvalidToken)?;

        if self.db.session_revoked(&token_hash(token)).await? {
            tracing::debug!(user_id, "Rejected token for revoked session");
            return Err(AppError::InvalidToken);
        }

        Ok(user_id)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AppError> {
        self.db
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }

    fn issue(&self, user_id: i64) -> Result<IssuedToken, AppError> {
        self.tokens.issue(user_id).map_err(|e| match e {
            TokenError::Invalid => AppError::InvalidToken,
            other => AppError::Internal(other.into()),
        })
    }

    /// Session insert and last-login update. Failures here never fail the
    /// request.
    async fn record_session(
        &self,
        user: &User,
        token: &IssuedToken,
        ip_address: Option<String>,
        update_last_login: bool,
    ) {
        if update_last_login {
            best_effort(
                "update last_login",
                user.user_id,
                self.db.touch_last_login(user.user_id, token.issued_at).await,
            );
        }

        best_effort(
            "insert session",
            user.user_id,
            self.db
                .insert_session(NewSession {
                    user_id: user.user_id,
                    token_hash: token_hash(&token.token),
                    ip_address,
                    issued_at: token.issued_at,
                    expires_at: token.expires_at,
                })
                .await,
        );
    }
}
