// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! bcrypt password hashing.
//!
//! All functions here are CPU-bound; async callers run them on the blocking pool.

use std::sync::LazyLock;

/// Stand-in hash checked when a login names no account, so that both
/// failure paths pay for one bcrypt verification.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("notify-vital-placeholder").unwrap_or_default());

/// Hash a plaintext password with a fresh salt at the default cost.
pub fn hash_password(plaintext: &str) -> anyhow::Result<String> {
    Ok(bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)?)
}

/// Check a plaintext against a stored hash. A malformed hash is a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Spend the cost of [`verify_password`] without an account. Always false.
pub fn verify_dummy(plaintext: &str) -> bool {
    verify_password(plaintext, &DUMMY_HASH);
    false
}
