// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: Postgres (users, sessions, health metrics) and Firestore
//! (federated profiles).

pub mod firestore;
pub mod health;
pub mod memory;
pub mod postgres;

pub use firestore::FirestoreDb;
pub use memory::{MemoryMirror, MemoryStore};
pub use postgres::Database;

/// Firestore collection names as constants.
pub mod collections {
    /// Federated user profiles (keyed by Firebase uid)
    pub const USERS: &str = "users";
}
