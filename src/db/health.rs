// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health metric persistence. Every query is scoped to one user.

use crate::db::postgres::{Backend, Database};
use crate::error::AppError;
use crate::models::health::{
    ActivityStatusRequest, CaloriesRequest, DateRange, HealthDataRequest, HeartRateRequest,
    HistoryQuery, StepsRequest,
};
use crate::models::{
    ActivityStatusUpdate, CaloriesData, HealthData, HealthDataSummary, HeartRateData, StepsData,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::BTreeMap;

/// Append the optional timestamp bounds to a query already filtered by user.
fn push_range(
    qb: &mut QueryBuilder<'_, Postgres>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) {
    if let Some(start) = start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
}

/// A metric table: its column projection and the id column that breaks
/// timestamp ties.
struct Table {
    select: &'static str,
    id_column: &'static str,
}

impl Table {
    /// Column list of the `SELECT`, reused for `RETURNING`.
    fn columns(&self) -> &'static str {
        let start = "SELECT ".len();
        let end = self.select.find(" FROM ").unwrap_or(self.select.len());
        &self.select[start..end]
    }
}

async fn pg_history<T>(
    pool: &PgPool,
    table: &Table,
    user_id: i64,
    query: &HistoryQuery,
) -> Result<Vec<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut qb = QueryBuilder::<Postgres>::new(table.select);
    qb.push(" WHERE user_id = ").push_bind(user_id);
    push_range(&mut qb, query.start, query.end);
    qb.push(" ORDER BY timestamp DESC, ")
        .push(table.id_column)
        .push(" DESC LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.offset);

    Ok(qb.build_query_as::<T>().fetch_all(pool).await?)
}

const HEALTH_DATA: Table = Table {
    select: "SELECT data_id, user_id, device_id, timestamp, heart_rate, steps, \
             calories_burned, activity_status, activity_gauge_value, created_at FROM health_data",
    id_column: "data_id",
};
const HEART_RATE: Table = Table {
    select: "SELECT id, user_id, device_id, timestamp, heart_rate, activity_type, created_at \
             FROM heart_rate_data",
    id_column: "id",
};
const STEPS: Table = Table {
    select: "SELECT id, user_id, device_id, timestamp, steps_count, distance, created_at \
             FROM steps_data",
    id_column: "id",
};
const CALORIES: Table = Table {
    select: "SELECT id, user_id, device_id, timestamp, calories_burned, activity_type, \
             created_at FROM calories_data",
    id_column: "id",
};
const ACTIVITY: Table = Table {
    select: "SELECT id, user_id, timestamp, previous_status, current_status, \
             status_change_reason, created_at FROM activity_status_updates",
    id_column: "id",
};

fn latest_query() -> HistoryQuery {
    HistoryQuery {
        start: None,
        end: None,
        limit: 1,
        offset: 0,
    }
}

/// Summarize aggregate rows held in memory.
fn summarize(rows: &[HealthData], range: &DateRange) -> HealthDataSummary {
    let rates: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.heart_rate.map(i64::from))
        .collect();
    let average_heart_rate = if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<i64>() as f64 / rates.len() as f64
    };

    let mut activity_distribution = BTreeMap::new();
    for row in rows {
        *activity_distribution
            .entry(row.activity_status.clone())
            .or_insert(0) += 1;
    }

    HealthDataSummary {
        average_heart_rate,
        total_steps: rows.iter().filter_map(|r| r.steps).map(i64::from).sum(),
        total_calories_burned: rows
            .iter()
            .filter_map(|r| r.calories_burned)
            .map(i64::from)
            .sum(),
        activity_distribution,
        period_start: range.start,
        period_end: range.end,
    }
}

impl Database {
    // ─── Aggregate Health Data ───────────────────────────────────

    /// Most recent aggregate record for a user.
    pub async fn latest_health_data(&self, user_id: i64) -> Result<Option<HealthData>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(pg_history::<HealthData>(
                pool,
                &HEALTH_DATA,
                user_id,
                &latest_query(),
            )
            .await?
            .into_iter()
            .next()),
            Backend::Memory(store) => Ok(store.health_data.latest(user_id)),
        }
    }

    pub async fn health_data_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<Vec<HealthData>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => pg_history(pool, &HEALTH_DATA, user_id, query).await,
            Backend::Memory(store) => Ok(store.health_data.history(user_id, query)),
        }
    }

    pub async fn insert_health_data(
        &self,
        user_id: i64,
        req: &HealthDataRequest,
        now: DateTime<Utc>,
    ) -> Result<HealthData, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO health_data (user_id, device_id, timestamp, heart_rate, steps, \
                     calories_burned, activity_status, activity_gauge_value, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $3) \
                     RETURNING {}",
                    HEALTH_DATA.columns()
                );
                Ok(sqlx::query_as::<_, HealthData>(&sql)
                    .bind(user_id)
                    .bind(req.device_id)
                    .bind(now)
                    .bind(req.heart_rate)
                    .bind(req.steps)
                    .bind(req.calories_burned)
                    .bind(&req.activity_status)
                    .bind(req.activity_gauge_value)
                    .fetch_one(pool)
                    .await?)
            }
            Backend::Memory(store) => {
                let row = HealthData {
                    data_id: store.next_id(),
                    user_id,
                    device_id: req.device_id,
                    timestamp: now,
                    heart_rate: req.heart_rate,
                    steps: req.steps,
                    calories_burned: req.calories_burned,
                    activity_status: req.activity_status.clone(),
                    activity_gauge_value: req.activity_gauge_value,
                    created_at: now,
                };
                store.health_data.push(user_id, row.clone());
                Ok(row)
            }
        }
    }

    /// Summary statistics over aggregate records within `range`.
    pub async fn health_summary(
        &self,
        user_id: i64,
        range: &DateRange,
    ) -> Result<HealthDataSummary, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut qb = QueryBuilder::<Postgres>::new(
                    "SELECT COALESCE(AVG(heart_rate), 0)::float8, \
                     COALESCE(SUM(steps), 0)::int8, \
                     COALESCE(SUM(calories_burned), 0)::int8 \
                     FROM health_data WHERE user_id = ",
                );
                qb.push_bind(user_id);
                push_range(&mut qb, range.start, range.end);
                let (average_heart_rate, total_steps, total_calories_burned): (f64, i64, i64) =
                    qb.build_query_as().fetch_one(pool).await?;

                let mut qb = QueryBuilder::<Postgres>::new(
                    "SELECT activity_status, COUNT(*) FROM health_data WHERE user_id = ",
                );
                qb.push_bind(user_id);
                push_range(&mut qb, range.start, range.end);
                qb.push(" GROUP BY activity_status");
                let activity_distribution: BTreeMap<String, i64> = qb
                    .build_query_as::<(String, i64)>()
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .collect();

                Ok(HealthDataSummary {
                    average_heart_rate,
                    total_steps,
                    total_calories_burned,
                    activity_distribution,
                    period_start: range.start,
                    period_end: range.end,
                })
            }
            Backend::Memory(store) => {
                let rows = store.health_data.in_range(user_id, range);
                Ok(summarize(&rows, range))
            }
        }
    }

    // ─── Heart Rate ──────────────────────────────────────────────

    pub async fn heart_rate_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<Vec<HeartRateData>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => pg_history(pool, &HEART_RATE, user_id, query).await,
            Backend::Memory(store) => Ok(store.heart_rate.history(user_id, query)),
        }
    }

    pub async fn insert_heart_rate(
        &self,
        user_id: i64,
        req: &HeartRateRequest,
        now: DateTime<Utc>,
    ) -> Result<HeartRateData, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO heart_rate_data (user_id, device_id, timestamp, heart_rate, \
                     activity_type, created_at) VALUES ($1, $2, $3, $4, $5, $3) RETURNING {}",
                    HEART_RATE.columns()
                );
                Ok(sqlx::query_as::<_, HeartRateData>(&sql)
                    .bind(user_id)
                    .bind(req.device_id)
                    .bind(now)
                    .bind(req.heart_rate)
                    .bind(&req.activity_type)
                    .fetch_one(pool)
                    .await?)
            }
            Backend::Memory(store) => {
                let row = HeartRateData {
                    id: store.next_id(),
                    user_id,
                    device_id: req.device_id,
                    timestamp: now,
                    heart_rate: req.heart_rate,
                    activity_type: req.activity_type.clone(),
                    created_at: now,
                };
                store.heart_rate.push(user_id, row.clone());
                Ok(row)
            }
        }
    }

    // ─── Steps ───────────────────────────────────────────────────

    pub async fn steps_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<Vec<StepsData>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => pg_history(pool, &STEPS, user_id, query).await,
            Backend::Memory(store) => Ok(store.steps.history(user_id, query)),
        }
    }

    pub async fn insert_steps(
        &self,
        user_id: i64,
        req: &StepsRequest,
        now: DateTime<Utc>,
    ) -> Result<StepsData, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO steps_data (user_id, device_id, timestamp, steps_count, distance, \
                     created_at) VALUES ($1, $2, $3, $4, $5, $3) RETURNING {}",
                    STEPS.columns()
                );
                Ok(sqlx::query_as::<_, StepsData>(&sql)
                    .bind(user_id)
                    .bind(req.device_id)
                    .bind(now)
                    .bind(req.steps_count)
                    .bind(req.distance)
                    .fetch_one(pool)
                    .await?)
            }
            Backend::Memory(store) => {
                let row = StepsData {
                    id: store.next_id(),
                    user_id,
                    device_id: req.device_id,
                    timestamp: now,
                    steps_count: req.steps_count,
                    distance: req.distance,
                    created_at: now,
                };
                store.steps.push(user_id, row.clone());
                Ok(row)
            }
        }
    }

    // ─── Calories ────────────────────────────────────────────────

    pub async fn calories_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<Vec<CaloriesData>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => pg_history(pool, &CALORIES, user_id, query).await,
            Backend::Memory(store) => Ok(store.calories.history(user_id, query)),
        }
    }

    pub async fn insert_calories(
        &self,
        user_id: i64,
        req: &CaloriesRequest,
        now: DateTime<Utc>,
    ) -> Result<CaloriesData, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO calories_data (user_id, device_id, timestamp, calories_burned, \
                     activity_type, created_at) VALUES ($1, $2, $3, $4, $5, $3) RETURNING {}",
                    CALORIES.columns()
                );
                Ok(sqlx::query_as::<_, CaloriesData>(&sql)
                    .bind(user_id)
                    .bind(req.device_id)
                    .bind(now)
                    .bind(req.calories_burned)
                    .bind(&req.activity_type)
                    .fetch_one(pool)
                    .await?)
            }
            Backend::Memory(store) => {
                let row = CaloriesData {
                    id: store.next_id(),
                    user_id,
                    device_id: req.device_id,
                    timestamp: now,
                    calories_burned: req.calories_burned,
                    activity_type: req.activity_type.clone(),
                    created_at: now,
                };
                store.calories.push(user_id, row.clone());
                Ok(row)
            }
        }
    }

    // ─── Activity Status ─────────────────────────────────────────

    pub async fn activity_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<Vec<ActivityStatusUpdate>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => pg_history(pool, &ACTIVITY, user_id, query).await,
            Backend::Memory(store) => Ok(store.activity.history(user_id, query)),
        }
    }

    /// Record a status transition. When `previous_status` is omitted it is
    /// taken from the user's latest transition.
    pub async fn insert_activity_status(
        &self,
        user_id: i64,
        req: &ActivityStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<ActivityStatusUpdate, AppError> {
        let previous_status = match &req.previous_status {
            Some(previous) => Some(previous.clone()),
            None => self
                .activity_history(user_id, &latest_query())
                .await?
                .into_iter()
                .next()
                .map(|latest| latest.current_status),
        };

        match &self.backend {
            Backend::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO activity_status_updates (user_id, timestamp, previous_status, \
                     current_status, status_change_reason, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $2) RETURNING {}",
                    ACTIVITY.columns()
                );
                Ok(sqlx::query_as::<_, ActivityStatusUpdate>(&sql)
                    .bind(user_id)
                    .bind(now)
                    .bind(&previous_status)
                    .bind(&req.current_status)
                    .bind(&req.status_change_reason)
                    .fetch_one(pool)
                    .await?)
            }
            Backend::Memory(store) => {
                let row = ActivityStatusUpdate {
                    id: store.next_id(),
                    user_id,
                    timestamp: now,
                    previous_status,
                    current_status: req.current_status.clone(),
                    status_change_reason: req.status_change_reason.clone(),
                    created_at: now,
                };
                store.activity.push(user_id, row.clone());
                Ok(row)
            }
        }
    }
}
