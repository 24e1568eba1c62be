// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper for the federated profile mirror.
//!
//! Documents live in the `users` collection, keyed by Firebase uid.

use crate::db::collections;
use crate::db::memory::MemoryMirror;
use crate::error::AppError;
use crate::models::UserProfile;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryMirror>),
    Offline,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

impl FirestoreDb {
    /// Connect to Firestore for `project_id`.
    ///
    /// `FIRESTORE_EMULATOR_HOST` selects the emulator with a dummy bearer.
    /// Otherwise the service-account key file is used when it exists, else
    /// application default credentials.
    pub async fn new(project_id: &str, credentials_file: &Path) -> Result<Self, AppError> {
        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let (client, mode) = if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            let client = firestore::FirestoreDb::with_options_token_source(
                options,
                gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
                emulator_token_source(),
            )
            .await;
            (client, "emulator")
        } else if credentials_file.exists() {
            let client = firestore::FirestoreDb::with_options_service_account_key_file(
                options,
                credentials_file.to_path_buf(),
            )
            .await;
            (client, "service account")
        } else {
            (firestore::FirestoreDb::with_options(options).await, "default credentials")
        };

        let client = client.map_err(|e| store_error("connect", e))?;
        tracing::info!(project = project_id, mode, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Offline,
        }
    }

    /// Mirror held in process. Tests share the handle to inspect documents
    /// and inject write failures.
    pub fn with_memory_mirror(mirror: Arc<MemoryMirror>) -> Self {
        Self {
            backend: Backend::Memory(mirror),
        }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        match &self.backend {
            Backend::Firestore(client) => Ok(client),
            _ => Err(AppError::Database(
                "Database not connected (offline mode)".to_string(),
            )),
        }
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a profile by Firebase uid.
    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        if let Backend::Memory(mirror) = &self.backend {
            return Ok(mirror.profile(uid));
        }

        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| store_error("get profile", e))
    }

    /// Create or replace a profile document.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        if let Backend::Memory(mirror) = &self.backend {
            return mirror.upsert(profile).map_err(|e| store_error("upsert profile", e));
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&profile.uid)
            .object(profile)
            .execute()
            .await
            .map_err(|e| store_error("upsert profile", e))?;
        Ok(())
    }

    /// Delete a profile document. Deleting a missing document succeeds.
    pub async fn delete_profile(&self, uid: &str) -> Result<(), AppError> {
        if let Backend::Memory(mirror) = &self.backend {
            return mirror.delete(uid).map_err(|e| store_error("delete profile", e));
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| store_error("delete profile", e))?;

        tracing::debug!(uid, "Deleted user profile");
        Ok(())
    }
}

/// The emulator accepts any bearer; hand it an unsigned placeholder.
fn emulator_token_source() -> gcloud_sdk::TokenSourceType {
    let source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
        Ok(gcloud_sdk::Token {
            token_type: "Bearer".to_string(),
            token: gcloud_sdk::SecretValue::new("eyJhbGciOiJub25lIn0.e30.".to_string().into()),
            expiry: chrono::Utc::now() + chrono::Duration::hours(1),
        })
    });
    gcloud_sdk::TokenSourceType::ExternalSource(Box::new(source))
}

fn store_error(operation: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Database(format!("Firestore {operation} failed: {err}"))
}
