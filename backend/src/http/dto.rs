//! Data Transfer Objects for the HTTP API.
//!
//! Domain types already derive Serialize/Deserialize and are re-exported;
//! only the response envelopes live here.

use serde::{Deserialize, Serialize};

pub use crate::api::{ObservingPlan, PlanId, PlanSummary, RankedField, VisibilityResult};

/// Response for the health check endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Plan store state
    pub storage: String,
    /// Whether a site is known, i.e. visibility endpoints can answer
    pub location_known: bool,
}

/// Response for listing plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanSummary>,
    pub total: usize,
}

/// Optional evaluation instant for visibility endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeQuery {
    /// Modified Julian Date; defaults to now
    pub mjd: Option<f64>,
}

/// Visibility of every remaining field of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanVisibilityResponse {
    pub plan_id: PlanId,
    pub name: String,
    pub mjd: f64,
    pub min_altitude_deg: f64,
    pub fields: Vec<VisibilityResult>,
}

/// Fields observable now across pending plans, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub mjd: f64,
    pub min_altitude_deg: f64,
    pub fields: Vec<RankedField>,
    /// Pending plans that can no longer be observed
    pub expired: Vec<PlanId>,
}
