// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod health;
pub mod profile;
pub mod user;

pub use health::{
    ActivityStatusUpdate, CaloriesData, HealthData, HealthDataSummary, HeartRateData, StepsData,
};
pub use profile::{Gender, UserProfile};
pub use user::{Session, User};
