// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Federated-identity account service.
//!
//! Firebase Auth is authoritative for identity fields; the Firestore
//! profile mirror holds everything else.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::profile::{SignUpRequest, SignUpResponse, UpdateProfileRequest};
use crate::models::UserProfile;
use crate::services::firebase::{
    FirebaseAuth, NewProviderUser, ProviderUser, ProviderUserUpdate, CUSTOM_TOKEN_TTL_SECS,
};
use crate::services::best_effort;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of a sign-up. The account exists in both cases.
#[derive(Debug)]
pub enum SignUpOutcome {
    Complete(SignUpResponse),
    /// Account created but a follow-up step failed.
    Partial { message: &'static str, uid: String },
}

#[derive(Clone)]
pub struct ProfileService {
    auth: Arc<FirebaseAuth>,
    store: FirestoreDb,
}

impl ProfileService {
    pub fn new(auth: Arc<FirebaseAuth>, store: FirestoreDb) -> Self {
        Self { auth, store }
    }

    /// Create the provider account, mirror its profile and mint a custom token.
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<SignUpOutcome, AppError> {
        let email = req.email.trim().to_ascii_lowercase();
        let created = self
            .auth
            .create_user(&NewProviderUser {
                email: &email,
                password: &req.password,
                display_name: &req.display_name,
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Provider account creation failed"))?;

        let mut profile = profile_from_provider(&created, Utc::now());
        profile.gender = req.gender;
        profile.height = req.height;
        profile.weight = req.weight;

        if let Err(e) = self.store.upsert_profile(&profile).await {
            tracing::warn!(uid = %created.uid, error = %e, "Profile mirror write failed after sign-up");
            return Ok(SignUpOutcome::Partial {
                message: "User created successfully, but profile data storage failed",
                uid: created.uid,
            });
        }

        let token = match self.issue_service_token(&created.uid) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(uid = %created.uid, error = %e, "Custom token mint failed after sign-up");
                return Ok(SignUpOutcome::Partial {
                    message: "User created successfully, but token generation failed",
                    uid: created.uid,
                });
            }
        };

        tracing::info!(uid = %created.uid, "Federated user signed up");

        Ok(SignUpOutcome::Complete(SignUpResponse {
            token,
            expires_in: CUSTOM_TOKEN_TTL_SECS,
            display_name: profile.display_name,
            uid: profile.uid,
            email: profile.email,
            photo_url: profile.photo_url,
        }))
    }

    /// Mint a provider custom token for `uid`.
    pub fn issue_service_token(&self, uid: &str) -> Result<String, AppError> {
        Ok(self.auth.create_custom_token(uid)?)
    }

    /// Profile from the mirror, falling back to the provider and lazily
    /// backfilling the mirror.
    pub async fn get_profile(&self, uid: &str) -> Result<UserProfile, AppError> {
        if let Some(profile) = self.store.get_profile(uid).await? {
            return Ok(profile);
        }

        tracing::debug!(uid, "Profile missing from mirror, falling back to provider");
        let provider_user = self.auth.get_user(uid).await?;
        let profile = profile_from_provider(&provider_user, Utc::now());

        best_effort("backfill profile", uid, self.store.upsert_profile(&profile).await);

        Ok(profile)
    }

    /// Apply a partial update: provider fields first, then the mirror.
    pub async fn update_profile(
        &self,
        uid: &str,
        update: &UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        if update.touches_provider() {
            self.auth
                .update_user(
                    uid,
                    &ProviderUserUpdate {
                        display_name: update.display_name.clone(),
                        photo_url: update.photo_url.clone(),
                    },
                )
                .await?;
        }

        let now = Utc::now();
        let mut profile = match self.store.get_profile(uid).await? {
            Some(profile) => profile,
            None => profile_from_provider(&self.auth.get_user(uid).await?, now),
        };
        profile.apply_update(update, now);
        self.store.upsert_profile(&profile).await?;

        tracing::info!(uid, "Profile updated");
        Ok(profile)
    }

    /// Delete the provider account, then the mirror document best-effort.
    pub async fn delete_account(&self, uid: &str) -> Result<(), AppError> {
        self.auth.delete_user(uid).await?;
        best_effort("delete profile", uid, self.store.delete_profile(uid).await);
        tracing::info!(uid, "Account deleted");
        Ok(())
    }
}

fn profile_from_provider(user: &ProviderUser, now: DateTime<Utc>) -> UserProfile {
    UserProfile {
        uid: user.uid.clone(),
        email: user.email.clone().unwrap_or_default(),
        display_name: user.display_name.clone().unwrap_or_default(),
        photo_url: user.photo_url.clone(),
        phone_number: user.phone_number.clone(),
        provider: user
            .provider_id
            .clone()
            .unwrap_or_else(|| "password".to_string()),
        created_at: user.created_at.unwrap_or(now),
        updated_at: now,
        date_of_birth: None,
        gender: None,
        height: None,
        weight: None,
    }
}
