//! Public API surface of the bridge.
//!
//! This file consolidates the domain types shared by the plan store, the
//! visibility filter, the telescope executor and the HTTP layer.
//! All types derive Serialize/Deserialize for JSON serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

pub use crate::models::ModifiedJulianDate;

crate::define_id_type!(i64, PlanId);
crate::define_id_type!(i64, FieldId);

/// Observer location (latitude, longitude, elevation).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObserverLocation {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees, east positive (-180 to 180)
    pub longitude: f64,
    /// Elevation in meters above sea level
    #[serde(default)]
    pub elevation_m: f64,
}

impl ObserverLocation {
    pub fn new(latitude: f64, longitude: f64, elevation_m: f64) -> BridgeResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(BridgeError::InvalidLocation(format!(
                "latitude {} must be between -90 and 90 degrees",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(BridgeError::InvalidLocation(format!(
                "longitude {} must be between -180 and 180 degrees",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_m,
        })
    }
}

/// Time period in Modified Julian Date (MJD) format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// Start time in MJD
    pub start: ModifiedJulianDate,
    /// End time in MJD
    pub stop: ModifiedJulianDate,
}

impl Period {
    pub fn new(start: ModifiedJulianDate, stop: ModifiedJulianDate) -> Option<Self> {
        if start.value() < stop.value() {
            Some(Self { start, stop })
        } else {
            None
        }
    }

    pub fn from_mjd(start: f64, stop: f64) -> Self {
        Self {
            start: ModifiedJulianDate::new(start),
            stop: ModifiedJulianDate::new(stop),
        }
    }

    /// Length of the interval in days.
    pub fn duration(&self) -> qtty::Days {
        qtty::Days::new(self.stop.value() - self.start.value())
    }

    /// Check if a given MJD instant lies inside this interval (inclusive start, exclusive end).
    pub fn contains(&self, t_mjd: ModifiedJulianDate) -> bool {
        self.start.value() <= t_mjd.value() && t_mjd.value() < self.stop.value()
    }

    /// True once `t_mjd` has reached the end of the interval.
    pub fn has_elapsed(&self, t_mjd: ModifiedJulianDate) -> bool {
        t_mjd.value() >= self.stop.value()
    }
}

/// Exposure instructions attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureParameters {
    /// Filter name (e.g. "R")
    pub filter: String,
    /// Single frame exposure time
    pub exposure_time: qtty::Seconds,
    /// Number of frames to acquire at the pointing
    #[serde(default = "default_frame_count")]
    pub count: u32,
}

fn default_frame_count() -> u32 {
    1
}

impl ExposureParameters {
    pub fn new(filter: impl Into<String>, exposure_time_s: f64, count: u32) -> Self {
        Self {
            filter: filter.into(),
            exposure_time: qtty::Seconds::new(exposure_time_s),
            count,
        }
    }
}

impl Default for ExposureParameters {
    fn default() -> Self {
        Self::new("R", 120.0, 1)
    }
}

/// Check that equatorial coordinates lie in their documented ranges.
///
/// Right ascension must be in [0, 360) and declination in [-90, 90] degrees.
pub fn validate_coordinates(ra_deg: f64, dec_deg: f64) -> BridgeResult<()> {
    if !(0.0..360.0).contains(&ra_deg) {
        return Err(BridgeError::invalid_coordinate(format!(
            "right ascension {} outside [0, 360)",
            ra_deg
        )));
    }
    if !(-90.0..=90.0).contains(&dec_deg) {
        return Err(BridgeError::invalid_coordinate(format!(
            "declination {} outside [-90, 90]",
            dec_deg
        )));
    }
    Ok(())
}

/// A single pointing (sky position) with exposure instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Tile identifier (SkyPortal field id)
    pub id: FieldId,
    /// Right Ascension in degrees
    pub ra: qtty::Degrees,
    /// Declination in degrees
    pub dec: qtty::Degrees,
    /// Tile probability reported by SkyPortal
    #[serde(default)]
    pub weight: f64,
    pub exposure: ExposureParameters,
    /// Optional window outside of which the field must not be observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<Period>,
}

impl Field {
    /// Build a field, rejecting out-of-range coordinates.
    pub fn new(
        id: FieldId,
        ra_deg: f64,
        dec_deg: f64,
        exposure: ExposureParameters,
    ) -> BridgeResult<Self> {
        validate_coordinates(ra_deg, dec_deg).map_err(|e| match e {
            BridgeError::InvalidCoordinate { message } => {
                BridgeError::invalid_coordinate(format!("field {}: {}", id, message))
            }
            other => other,
        })?;
        Ok(Self {
            id,
            ra: qtty::Degrees::new(ra_deg),
            dec: qtty::Degrees::new(dec_deg),
            weight: 0.0,
            exposure,
            validity: None,
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_validity(mut self, validity: Period) -> Self {
        self.validity = Some(validity);
        self
    }
}

/// Lifecycle state of an observing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Pending,
    Active,
    Completed,
    Expired,
}

impl PlanStatus {
    /// Pending and active plans still have work for the telescope.
    pub fn is_open(&self) -> bool {
        matches!(self, PlanStatus::Pending | PlanStatus::Active)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
            PlanStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Observing plan fetched from SkyPortal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingPlan {
    /// SkyPortal plan identifier
    pub id: PlanId,
    /// Storage name, see [`plan_basename`]
    pub name: String,
    /// Human readable event name (GCN alias)
    #[serde(default)]
    pub event_name: String,
    /// Trigger time of the event as reported by SkyPortal
    pub dateobs: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub requester: String,
    /// Plan-level priority, higher is more urgent
    #[serde(default)]
    pub priority: f64,
    pub status: PlanStatus,
    /// SHA256 checksum of the source payload
    #[serde(default)]
    pub checksum: String,
    /// Ordered sequence of fields
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Storage name of a plan: `<dateobs>_<plan name>` with spaces replaced by underscores.
pub fn plan_basename(dateobs: &str, plan_name: &str) -> String {
    format!("{}_{}", dateobs, plan_name.replace(' ', "_"))
}

/// Lightweight listing entry for stored plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: PlanId,
    pub name: String,
    pub event_name: String,
    pub status: PlanStatus,
    pub priority: f64,
    pub field_count: usize,
}

impl From<&ObservingPlan> for PlanSummary {
    fn from(plan: &ObservingPlan) -> Self {
        Self {
            plan_id: plan.id,
            name: plan.name.clone(),
            event_name: plan.event_name.clone(),
            status: plan.status,
            priority: plan.priority,
            field_count: plan.fields.len(),
        }
    }
}

/// Horizontal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltAz {
    /// Altitude above the mathematical horizon in degrees
    pub altitude: qtty::Degrees,
    /// Azimuth in degrees, measured from north through east
    pub azimuth: qtty::Degrees,
}

/// Next crossing of the minimum altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "hours", rename_all = "snake_case")]
pub enum HorizonCrossing {
    /// Currently above the limit, drops below it after the given time
    SetsIn(qtty::Hours),
    /// Currently below the limit, reaches it after the given time
    RisesIn(qtty::Hours),
    /// Never drops below the limit at this latitude
    AlwaysAbove,
    /// Never reaches the limit at this latitude
    NeverRises,
}

impl HorizonCrossing {
    /// Hours until the field sets, used as the urgency key when ranking.
    ///
    /// Never-setting fields sort last (`f64::INFINITY`); fields that are not
    /// up have no time left (`0.0`).
    pub fn time_to_set_hours(&self) -> f64 {
        match self {
            HorizonCrossing::SetsIn(h) => h.value(),
            HorizonCrossing::AlwaysAbove => f64::INFINITY,
            HorizonCrossing::RisesIn(_) | HorizonCrossing::NeverRises => 0.0,
        }
    }
}

/// Visibility of one field at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityResult {
    pub field_id: FieldId,
    pub observable_now: bool,
    pub alt_az: AltAz,
    pub crossing: HorizonCrossing,
}

/// An observable field selected for execution, with the plan it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedField {
    pub plan_id: PlanId,
    pub plan_priority: f64,
    pub event_name: String,
    pub field: Field,
    pub visibility: VisibilityResult,
}
