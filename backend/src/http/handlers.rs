//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the plan
//! store and the visibility filter.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::dto::{
    HealthResponse, ObservingPlan, PlanListResponse, PlanVisibilityResponse, ScheduleResponse,
    TimeQuery,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{ModifiedJulianDate, PlanId};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn evaluation_time(query: &TimeQuery) -> Result<ModifiedJulianDate, AppError> {
    match query.mjd {
        Some(mjd) if !mjd.is_finite() => {
            Err(AppError::BadRequest(format!("mjd must be finite, got {}", mjd)))
        }
        Some(mjd) => Ok(ModifiedJulianDate::new(mjd)),
        None => Ok(ModifiedJulianDate::now()),
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let storage = match state.repository.health_check().await {
        Ok(true) => "ok".to_string(),
        Ok(false) => "unavailable".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        storage,
        location_known: state.location.is_some(),
    }))
}

// =============================================================================
// Plans
// =============================================================================

/// GET /v1/plans
///
/// Every stored plan, newest trigger first.
pub async fn list_plans(State(state): State<AppState>) -> HandlerResult<PlanListResponse> {
    let plans = state.repository.list_plans().await?;
    let total = plans.len();
    Ok(Json(PlanListResponse { plans, total }))
}

/// GET /v1/plans/{plan_id}
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
) -> HandlerResult<ObservingPlan> {
    Ok(Json(state.repository.get_plan(PlanId::new(plan_id)).await?))
}

/// GET /v1/plans/{plan_id}/visibility?mjd=<mjd>
///
/// Altitude, azimuth and next horizon crossing of each remaining field.
pub async fn get_plan_visibility(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
    Query(query): Query<TimeQuery>,
) -> HandlerResult<PlanVisibilityResponse> {
    let t = evaluation_time(&query)?;
    let filter = state.filter()?;
    let plan = state.repository.get_plan(PlanId::new(plan_id)).await?;

    let fields = plan
        .fields
        .iter()
        .map(|field| filter.visibility(field, t))
        .collect();

    Ok(Json(PlanVisibilityResponse {
        plan_id: plan.id,
        name: plan.name,
        mjd: t.value(),
        min_altitude_deg: filter.min_altitude().value(),
        fields,
    }))
}

// =============================================================================
// Schedule
// =============================================================================

/// GET /v1/schedule?mjd=<mjd>
///
/// What the observer pass would execute at the given instant.
pub async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<TimeQuery>,
) -> HandlerResult<ScheduleResponse> {
    let t = evaluation_time(&query)?;
    let filter = state.filter()?;
    let plans = state.repository.list_pending_plans().await?;

    Ok(Json(ScheduleResponse {
        mjd: t.value(),
        min_altitude_deg: filter.min_altitude().value(),
        fields: filter.rank(&plans, t),
        expired: filter.expired(&plans, t).into_iter().collect(),
    }))
}
