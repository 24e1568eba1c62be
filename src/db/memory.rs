// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process relational store used when `DATABASE_URL` is not set.
//!
//! Metric tables are keyed by user id so every read is user-scoped by
//! construction. State does not survive restarts.
//!
//! [`MemoryMirror`] plays the same role for the Firestore profile mirror.

use crate::error::AppError;
use crate::models::health::{DateRange, HistoryQuery};
use crate::models::user::{NewSession, NewUser, Session, User};
use crate::models::{
    ActivityStatusUpdate, CaloriesData, HealthData, HeartRateData, StepsData, UserProfile,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Rows that carry a measurement timestamp.
pub trait Timestamped: Clone {
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! impl_timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        })*
    };
}

impl_timestamped!(HealthData, HeartRateData, StepsData, CaloriesData, ActivityStatusUpdate);

/// Append-only per-user table.
pub struct UserTable<T> {
    rows: DashMap<i64, Vec<T>>,
}

impl<T> Default for UserTable<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<T: Timestamped> UserTable<T> {
    pub fn push(&self, user_id: i64, row: T) {
        self.rows.entry(user_id).or_default().push(row);
    }

    /// Newest-first page of rows for one user.
    pub fn history(&self, user_id: i64, query: &HistoryQuery) -> Vec<T> {
        let range = DateRange {
            start: query.start,
            end: query.end,
        };
        let mut rows: Vec<T> = self
            .rows
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| range.contains(r.timestamp()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort keeps insertion order for equal timestamps; reverse
        // afterwards so the most recently inserted wins ties.
        rows.sort_by_key(|r| r.timestamp());
        rows.reverse();

        rows.into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect()
    }

    pub fn latest(&self, user_id: i64) -> Option<T> {
        self.history(
            user_id,
            &HistoryQuery {
                start: None,
                end: None,
                limit: 1,
                offset: 0,
            },
        )
        .into_iter()
        .next()
    }

    /// All rows for one user within a range, unordered.
    pub fn in_range(&self, user_id: i64, range: &DateRange) -> Vec<T> {
        self.rows
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| range.contains(r.timestamp()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-process stand-in for the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    users: DashMap<i64, User>,
    /// normalized email -> user_id; enforces uniqueness
    emails: DashMap<String, i64>,
    /// token_hash -> session
    sessions: DashMap<String, Session>,
    pub(crate) health_data: UserTable<HealthData>,
    pub(crate) heart_rate: UserTable<HeartRateData>,
    pub(crate) steps: UserTable<StepsData>,
    pub(crate) calories: UserTable<CaloriesData>,
    pub(crate) activity: UserTable<ActivityStatusUpdate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next row id (shared across tables).
    pub(crate) fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ─── Users ───────────────────────────────────────────────────

    pub fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        match self.emails.entry(new.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(
                "email is already registered".to_string(),
            )),
            Entry::Vacant(slot) => {
                let user = User {
                    user_id: self.next_id(),
                    username: new.username,
                    email: new.email,
                    password_hash: new.password_hash,
                    created_at: new.created_at,
                    last_login: None,
                    is_active: true,
                };
                self.users.insert(user.user_id, user.clone());
                slot.insert(user.user_id);
                Ok(user)
            }
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let user_id = *self.emails.get(email)?;
        self.find_user_by_id(user_id)
    }

    pub fn find_user_by_id(&self, user_id: i64) -> Option<User> {
        self.users.get(&user_id).map(|u| u.clone())
    }

    pub fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.last_login = Some(at);
        }
    }

    #[cfg(test)]
    pub fn set_active(&self, user_id: i64, active: bool) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    // ─── Sessions ────────────────────────────────────────────────

    pub fn insert_session(&self, new: NewSession) -> Result<(), AppError> {
        match self.sessions.entry(new.token_hash.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("record already exists".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Session {
                    session_id: self.next_id(),
                    user_id: new.user_id,
                    token_hash: new.token_hash,
                    ip_address: new.ip_address,
                    issued_at: new.issued_at,
                    expires_at: new.expires_at,
                    is_valid: true,
                });
                Ok(())
            }
        }
    }

    pub fn invalidate_session(&self, token_hash: &str) -> u64 {
        match self.sessions.get_mut(token_hash) {
            Some(mut session) if session.is_valid => {
                session.is_valid = false;
                1
            }
            _ => 0,
        }
    }

    pub fn session_revoked(&self, token_hash: &str) -> bool {
        self.sessions
            .get(token_hash)
            .is_some_and(|session| !session.is_valid)
    }

    pub fn purge_sessions(&self, expired_before: DateTime<Utc>) -> u64 {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at >= expired_before);
        (before - self.sessions.len()) as u64
    }

    #[cfg(test)]
    pub fn session(&self, token_hash: &str) -> Option<Session> {
        self.sessions.get(token_hash).map(|s| s.clone())
    }
}

/// In-process profile mirror keyed by Firebase uid.
///
/// Writes can be switched to fail while reads keep working.
#[derive(Default)]
pub struct MemoryMirror {
    profiles: DashMap<String, UserProfile>,
    fail_writes: AtomicBool,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn profile(&self, uid: &str) -> Option<UserProfile> {
        self.profiles.get(uid).map(|p| p.clone())
    }

    pub fn upsert(&self, profile: &UserProfile) -> Result<(), &'static str> {
        self.check_writable()?;
        self.profiles.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    pub fn delete(&self, uid: &str) -> Result<(), &'static str> {
        self.check_writable()?;
        self.profiles.remove(uid);
        Ok(())
    }

    fn check_writable(&self) -> Result<(), &'static str> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err("mirror unavailable")
        } else {
            Ok(())
        }
    }
}
