// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod firebase;
pub mod id_token;
pub mod local_auth;
pub mod password;
pub mod profile;
pub mod token;

pub use firebase::{FirebaseAuth, ProviderError};
pub use id_token::{FirebaseIdentity, IdTokenError, IdTokenVerifier};
pub use local_auth::LocalAuthService;
pub use profile::{ProfileService, SignUpOutcome};
pub use token::{TokenError, TokenService};

use crate::error::AppError;

/// Discard the result of a best-effort side effect, logging any failure.
///
/// Every non-critical write (session rows, last-login, profile mirror
/// backfill/cleanup) goes through here and nowhere else.
pub(crate) fn best_effort(
    operation: &'static str,
    subject: impl std::fmt::Display,
    result: Result<(), AppError>,
) {
    if let Err(e) = result {
        tracing::warn!(operation, subject = %subject, error = %e, "Best-effort write failed");
    }
}
