// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Federated user profile, mirrored into Firestore.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Profile document stored in the `users` collection, keyed by Firebase uid.
///
/// Email, display name and photo are owned by Firebase Auth; this copy may lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Sign-in provider tag (`password`, ...)
    #[serde(default)]
    pub provider: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Health profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    /// Centimeters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl UserProfile {
    /// Apply a partial update. Absent fields are left untouched.
    pub fn apply_update(&mut self, update: &UpdateProfileRequest, now: DateTime<Utc>) {
        if let Some(display_name) = &update.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(photo_url) = &update.photo_url {
            self.photo_url = Some(photo_url.clone());
        }
        if let Some(date_of_birth) = update.date_of_birth {
            self.date_of_birth = Some(date_of_birth);
        }
        if let Some(gender) = update.gender {
            self.gender = Some(gender);
        }
        if let Some(height) = update.height {
            self.height = Some(height);
        }
        if let Some(weight) = update.weight {
            self.weight = Some(weight);
        }
        self.updated_at = now;
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "displayName is required"))]
    pub display_name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "height must be positive"))]
    pub height: Option<f64>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "weight must be positive"))]
    pub weight: Option<f64>,
}

/// Partial profile update. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "displayName must not be empty"))]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    #[validate(url(message = "photoURL must be a URL"))]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "height must be positive"))]
    pub height: Option<f64>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "weight must be positive"))]
    pub weight: Option<f64>,
}

impl UpdateProfileRequest {
    /// Whether any field owned by the identity provider is present.
    pub fn touches_provider(&self) -> bool {
        self.display_name.is_some() || self.photo_url.is_some()
    }
}

/// Response body for a successful sign-up.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub token: String,
    pub expires_in: u64,
    pub display_name: String,
    pub uid: String,
    pub email: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}
