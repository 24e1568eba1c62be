// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health metric routes (`/api/health/*`). All require a session token.

use crate::error::{AppError, Result};
use crate::middleware::auth::Identity;
use crate::models::health::{
    ActivityStatusRequest, CaloriesRequest, DataEnvelope, DateRange, HealthDataFilters,
    HealthDataRequest, HeartRateRequest, HistoryQuery, StepsRequest, SummaryParams,
};
use crate::models::{
    ActivityStatusUpdate, CaloriesData, HealthData, HealthDataSummary, HeartRateData, StepsData,
};
use crate::routes::extract::{query_params, validated_json};
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type Filters = std::result::Result<Query<HealthDataFilters>, QueryRejection>;
type Created<T> = (StatusCode, Json<DataEnvelope<T>>);

/// Health routes. The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health/current", get(current))
        .route("/api/health/history", get(history))
        .route("/api/health/record", post(record))
        .route("/api/health/summary", get(summary))
        .route("/api/health/heart-rate/history", get(heart_rate_history))
        .route("/api/health/heart-rate/record", post(record_heart_rate))
        .route("/api/health/steps/history", get(steps_history))
        .route("/api/health/steps/record", post(record_steps))
        .route("/api/health/calories/history", get(calories_history))
        .route("/api/health/calories/record", post(record_calories))
        .route("/api/health/activity/history", get(activity_history))
        .route("/api/health/activity/status", post(record_activity_status))
}

fn history_query(filters: Filters) -> Result<HistoryQuery> {
    query_params(filters)?
        .resolve()
        .map_err(AppError::BadRequest)
}

fn created<T>(message: &'static str, data: T) -> Created<T> {
    (
        StatusCode::CREATED,
        Json(DataEnvelope::created(message, data)),
    )
}

// ─── Aggregate ───────────────────────────────────────────────

async fn current(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DataEnvelope<HealthData>>> {
    let data = state
        .db
        .latest_health_data(identity.local_user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("no health data found for user".to_string()))?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    filters: Filters,
) -> Result<Json<DataEnvelope<Vec<HealthData>>>> {
    let query = history_query(filters)?;
    let data = state
        .db
        .health_data_history(identity.local_user_id()?, &query)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn record(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: JsonBody<HealthDataRequest>,
) -> Result<Created<HealthData>> {
    let req = validated_json(body)?;
    let user_id = identity.local_user_id()?;
    let data = state.db.insert_health_data(user_id, &req, Utc::now()).await?;
    tracing::debug!(user_id, data_id = data.data_id, "Health data recorded");
    Ok(created("Health data recorded successfully", data))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    params: std::result::Result<Query<SummaryParams>, QueryRejection>,
) -> Result<Json<DataEnvelope<HealthDataSummary>>> {
    let params = query_params(params)?;
    let range = DateRange::parse(params.start_date.as_deref(), params.end_date.as_deref())
        .map_err(AppError::BadRequest)?;
    let data = state
        .db
        .health_summary(identity.local_user_id()?, &range)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

// ─── Heart Rate ──────────────────────────────────────────────

async fn heart_rate_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    filters: Filters,
) -> Result<Json<DataEnvelope<Vec<HeartRateData>>>> {
    let query = history_query(filters)?;
    let data = state
        .db
        .heart_rate_history(identity.local_user_id()?, &query)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn record_heart_rate(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: JsonBody<HeartRateRequest>,
) -> Result<Created<HeartRateData>> {
    let req = validated_json(body)?;
    let data = state
        .db
        .insert_heart_rate(identity.local_user_id()?, &req, Utc::now())
        .await?;
    Ok(created("Heart rate recorded successfully", data))
}

// ─── Steps ───────────────────────────────────────────────────

async fn steps_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    filters: Filters,
) -> Result<Json<DataEnvelope<Vec<StepsData>>>> {
    let query = history_query(filters)?;
    let data = state
        .db
        .steps_history(identity.local_user_id()?, &query)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn record_steps(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: JsonBody<StepsRequest>,
) -> Result<Created<StepsData>> {
    let req = validated_json(body)?;
    let data = state
        .db
        .insert_steps(identity.local_user_id()?, &req, Utc::now())
        .await?;
    Ok(created("Steps recorded successfully", data))
}

// ─── Calories ────────────────────────────────────────────────

async fn calories_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    filters: Filters,
) -> Result<Json<DataEnvelope<Vec<CaloriesData>>>> {
    let query = history_query(filters)?;
    let data = state
        .db
        .calories_history(identity.local_user_id()?, &query)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn record_calories(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: JsonBody<CaloriesRequest>,
) -> Result<Created<CaloriesData>> {
    let req = validated_json(body)?;
    let data = state
        .db
        .insert_calories(identity.local_user_id()?, &req, Utc::now())
        .await?;
    Ok(created("Calories recorded successfully", data))
}

// ─── Activity Status ─────────────────────────────────────────

async fn activity_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    filters: Filters,
) -> Result<Json<DataEnvelope<Vec<ActivityStatusUpdate>>>> {
    let query = history_query(filters)?;
    let data = state
        .db
        .activity_history(identity.local_user_id()?, &query)
        .await?;
    Ok(Json(DataEnvelope::new(data)))
}

async fn record_activity_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    body: JsonBody<ActivityStatusRequest>,
) -> Result<Created<ActivityStatusUpdate>> {
    let req = validated_json(body)?;
    let data = state
        .db
        .insert_activity_status(identity.local_user_id()?, &req, Utc::now())
        .await?;
    Ok(created("Activity status recorded successfully", data))
}
