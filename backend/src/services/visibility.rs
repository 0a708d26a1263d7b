//! Field visibility and scheduling filter.
//!
//! Pure functions of (field, observer location, instant, altitude limit):
//! nothing here keeps state between calls or touches the plan store, so the
//! listener, the observer pass and the HTTP layer can all call in at their
//! own cadence.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::debug;
use qtty::Degrees;

use crate::api::{
    AltAz, Field, HorizonCrossing, ModifiedJulianDate, ObserverLocation, ObservingPlan, PlanId,
    RankedField, VisibilityResult,
};
use crate::error::{BridgeError, BridgeResult};
use crate::services::coordinates;

/// Altitude limit used when none is configured.
pub const DEFAULT_MIN_ALTITUDE: Degrees = Degrees::new(20.0);

/// Altitude and azimuth of a field as seen from `location` at `timestamp`.
pub fn compute_alt_az(
    field: &Field,
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
) -> AltAz {
    coordinates::equatorial_to_horizontal(field.ra, field.dec, location, timestamp)
}

/// True iff the field is at or above `min_altitude` and inside its validity
/// window (when it has one).
pub fn is_observable(
    field: &Field,
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
    min_altitude: Degrees,
) -> bool {
    in_window(field, timestamp)
        && compute_alt_az(field, location, timestamp).altitude.value() >= min_altitude.value()
}

/// Full visibility record for one field.
pub fn compute_visibility(
    field: &Field,
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
    min_altitude: Degrees,
) -> VisibilityResult {
    let alt_az = compute_alt_az(field, location, timestamp);
    let crossing =
        coordinates::horizon_crossing(field.ra, field.dec, location, timestamp, min_altitude);
    VisibilityResult {
        field_id: field.id,
        observable_now: in_window(field, timestamp)
            && alt_az.altitude.value() >= min_altitude.value(),
        alt_az,
        crossing,
    }
}

/// Observable fields of the open plans, most urgent first.
///
/// Ordering: plan priority descending, then time-to-set ascending (fields
/// that never set come last), then field id, then plan id. Calling again at a
/// later instant recomputes membership and order from scratch.
pub fn rank_fields(
    plans: &[ObservingPlan],
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
    min_altitude: Degrees,
) -> Vec<RankedField> {
    let mut ranked: Vec<RankedField> = plans
        .iter()
        .filter(|plan| plan.status.is_open())
        .flat_map(|plan| {
            plan.fields.iter().filter_map(move |field| {
                let visibility = compute_visibility(field, location, timestamp, min_altitude);
                visibility.observable_now.then(|| RankedField {
                    plan_id: plan.id,
                    plan_priority: plan.priority,
                    event_name: plan.event_name.clone(),
                    field: field.clone(),
                    visibility,
                })
            })
        })
        .collect();

    ranked.sort_by(compare_ranked);
    debug!(
        "Ranked {} observable fields across {} plans",
        ranked.len(),
        plans.len()
    );
    ranked
}

fn compare_ranked(a: &RankedField, b: &RankedField) -> Ordering {
    b.plan_priority
        .total_cmp(&a.plan_priority)
        .then_with(|| {
            a.visibility
                .crossing
                .time_to_set_hours()
                .total_cmp(&b.visibility.crossing.time_to_set_hours())
        })
        .then_with(|| a.field.id.cmp(&b.field.id))
        .then_with(|| a.plan_id.cmp(&b.plan_id))
}

/// Plans whose every field is unobservable now and will stay so until its
/// validity window has elapsed.
///
/// A field without a window only counts when it never reaches the altitude
/// limit at this latitude, so circumpolar and merely-set fields keep their
/// plan alive. Empty plans are left to the caller. The result is advisory:
/// the store is not touched.
pub fn expire_plans(
    plans: &[ObservingPlan],
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
    min_altitude: Degrees,
) -> BTreeSet<PlanId> {
    plans
        .iter()
        .filter(|plan| !plan.fields.is_empty())
        .filter(|plan| {
            plan.fields
                .iter()
                .all(|field| permanently_unobservable(field, location, timestamp, min_altitude))
        })
        .map(|plan| plan.id)
        .collect()
}

fn permanently_unobservable(
    field: &Field,
    location: &ObserverLocation,
    timestamp: ModifiedJulianDate,
    min_altitude: Degrees,
) -> bool {
    let Some(window) = field.validity else {
        return matches!(
            coordinates::horizon_crossing(field.ra, field.dec, location, timestamp, min_altitude),
            HorizonCrossing::NeverRises
        );
    };

    if window.has_elapsed(timestamp) {
        return true;
    }

    // Evaluate from the first instant the window allows.
    let t0 = if timestamp.value() < window.start.value() {
        window.start
    } else {
        timestamp
    };
    match coordinates::horizon_crossing(field.ra, field.dec, location, t0, min_altitude) {
        HorizonCrossing::NeverRises => true,
        HorizonCrossing::AlwaysAbove | HorizonCrossing::SetsIn(_) => false,
        HorizonCrossing::RisesIn(hours) => t0.plus_hours(hours.value()).value() >= window.stop.value(),
    }
}

fn in_window(field: &Field, timestamp: ModifiedJulianDate) -> bool {
    field
        .validity
        .map_or(true, |window| window.contains(timestamp))
}

/// Visibility filter bound to one site and altitude limit.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityFilter {
    location: ObserverLocation,
    min_altitude: Degrees,
}

impl VisibilityFilter {
    /// Build a filter, failing fast when no observer location is known.
    pub fn new(location: Option<ObserverLocation>, min_altitude: Degrees) -> BridgeResult<Self> {
        let location = location.ok_or(BridgeError::MissingLocation)?;
        Ok(Self {
            location,
            min_altitude,
        })
    }

    pub fn location(&self) -> &ObserverLocation {
        &self.location
    }

    pub fn min_altitude(&self) -> Degrees {
        self.min_altitude
    }

    pub fn alt_az(&self, field: &Field, timestamp: ModifiedJulianDate) -> AltAz {
        compute_alt_az(field, &self.location, timestamp)
    }

    pub fn is_observable(&self, field: &Field, timestamp: ModifiedJulianDate) -> bool {
        is_observable(field, &self.location, timestamp, self.min_altitude)
    }

    pub fn visibility(&self, field: &Field, timestamp: ModifiedJulianDate) -> VisibilityResult {
        compute_visibility(field, &self.location, timestamp, self.min_altitude)
    }

    pub fn rank(&self, plans: &[ObservingPlan], timestamp: ModifiedJulianDate) -> Vec<RankedField> {
        rank_fields(plans, &self.location, timestamp, self.min_altitude)
    }

    pub fn expired(
        &self,
        plans: &[ObservingPlan],
        timestamp: ModifiedJulianDate,
    ) -> BTreeSet<PlanId> {
        expire_plans(plans, &self.location, timestamp, self.min_altitude)
    }
}
