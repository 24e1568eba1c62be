// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health metric records and their request/query types.
//!
//! Every record is append-only and belongs to exactly one user.

use crate::time_utils::{parse_date_bound, RangeBound};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub const DEFAULT_HISTORY_LIMIT: i64 = 30;
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Aggregate "current status" row (`health_data`).
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct HealthData {
    pub data_id: i64,
    pub user_id: i64,
    pub device_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<i32>,
    pub steps: Option<i32>,
    pub calories_burned: Option<i32>,
    pub activity_status: String,
    pub activity_gauge_value: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct HeartRateData {
    pub id: i64,
    pub user_id: i64,
    pub device_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: i32,
    pub activity_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StepsData {
    pub id: i64,
    pub user_id: i64,
    pub device_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub steps_count: i32,
    /// Meters
    pub distance: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CaloriesData {
    pub id: i64,
    pub user_id: i64,
    pub device_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub calories_burned: i32,
    pub activity_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ActivityStatusUpdate {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub previous_status: Option<String>,
    pub current_status: String,
    pub status_change_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─── Requests ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HealthDataRequest {
    pub device_id: Option<i64>,
    #[validate(range(min = 1, max = 300))]
    pub heart_rate: Option<i32>,
    #[validate(range(min = 0))]
    pub steps: Option<i32>,
    #[validate(range(min = 0))]
    pub calories_burned: Option<i32>,
    #[validate(length(min = 1, max = 64, message = "activity_status is required"))]
    pub activity_status: String,
    #[validate(range(min = 0.0, message = "activity_gauge_value must not be negative"))]
    pub activity_gauge_value: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HeartRateRequest {
    pub device_id: Option<i64>,
    #[validate(range(min = 1, max = 300, message = "heart_rate must be between 1 and 300"))]
    pub heart_rate: i32,
    #[validate(length(max = 64))]
    pub activity_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StepsRequest {
    pub device_id: Option<i64>,
    #[validate(range(min = 0, message = "steps_count must not be negative"))]
    pub steps_count: i32,
    #[validate(range(min = 0.0, message = "distance must not be negative"))]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CaloriesRequest {
    pub device_id: Option<i64>,
    #[validate(range(min = 0, message = "calories_burned must not be negative"))]
    pub calories_burned: i32,
    #[validate(length(max = 64))]
    pub activity_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivityStatusRequest {
    #[validate(length(max = 64))]
    pub previous_status: Option<String>,
    #[validate(length(min = 1, max = 64, message = "current_status is required"))]
    pub current_status: String,
    #[validate(length(max = 255))]
    pub status_change_reason: Option<String>,
}

// ─── Queries ─────────────────────────────────────────────────

/// Raw history query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthDataFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated, user-independent range query.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl HealthDataFilters {
    /// Validate the raw parameters.
    ///
    /// Missing or non-positive limits fall back to the default; limits are capped.
    pub fn resolve(&self) -> Result<HistoryQuery, String> {
        let range = DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?;

        let limit = match self.limit {
            Some(l) if l > 0 => l.min(MAX_HISTORY_LIMIT),
            _ => DEFAULT_HISTORY_LIMIT,
        };

        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err("offset must not be negative".to_string());
        }

        Ok(HistoryQuery {
            start: range.start,
            end: range.end,
            limit,
            offset,
        })
    }
}

/// Summary query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Inclusive timestamp range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let parse = |raw: Option<&str>, bound: RangeBound, name: &str| {
            raw.filter(|s| !s.trim().is_empty())
                .map(|s| {
                    parse_date_bound(s.trim(), bound).ok_or_else(|| {
                        format!("{name} must be an RFC3339 timestamp or YYYY-MM-DD date")
                    })
                })
                .transpose()
        };

        let range = Self {
            start: parse(start, RangeBound::Start, "start_date")?,
            end: parse(end, RangeBound::End, "end_date")?,
        };

        if let (Some(s), Some(e)) = (range.start, range.end) {
            if s > e {
                return Err("start_date must not be after end_date".to_string());
            }
        }

        Ok(range)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Summary statistics over aggregate health records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthDataSummary {
    pub average_heart_rate: f64,
    pub total_steps: i64,
    pub total_calories_burned: i64,
    pub activity_distribution: BTreeMap<String, i64>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// `{"data": ...}` envelope used by every health endpoint.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            message: None,
            data,
        }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self {
            message: Some(message),
            data,
        }
    }
}
