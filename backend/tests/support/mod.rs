#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use fram_bridge::api::{
    ExposureParameters, Field, FieldId, ModifiedJulianDate, ObserverLocation, ObservingPlan,
    PlanId, PlanStatus,
};
use fram_bridge::clients::SiteState;
use fram_bridge::services::NightWindow;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the variables on unwind and serializes access to the process
/// environment, since tests run in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Northern site on Tenerife, 2396 m.
pub fn teide() -> ObserverLocation {
    ObserverLocation::new(28.3, -16.5, 2396.0).unwrap()
}

/// 2024-03-20 01:06 UT, close to local midnight at Teide.
pub fn teide_midnight() -> ModifiedJulianDate {
    ModifiedJulianDate::from_datetime(Utc.with_ymd_and_hms(2024, 3, 20, 1, 6, 0).unwrap())
}

/// Teide with the night of 2024-03-19/20.
pub fn teide_site() -> SiteState {
    SiteState {
        location: teide(),
        night: NightWindow {
            begin: Utc.with_ymd_and_hms(2024, 3, 19, 20, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 20, 6, 0, 0).unwrap(),
        },
    }
}

pub fn field(id: i64, ra: f64, dec: f64, weight: f64) -> Field {
    Field::new(FieldId::new(id), ra, dec, ExposureParameters::default())
        .unwrap()
        .with_weight(weight)
}

pub fn plan(id: i64, priority: f64, fields: Vec<Field>) -> ObservingPlan {
    ObservingPlan {
        id: PlanId::new(id),
        name: format!("2024-03-19T12:00:00_GRANDMA_{}", id),
        event_name: format!("S2403{:02}a", id),
        dateobs: "2024-03-19T12:00:00".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 19, 12, 30, 0).unwrap(),
        requester: "grandma".to_string(),
        priority,
        status: PlanStatus::Pending,
        checksum: String::new(),
        fields,
    }
}

/// A SkyPortal observation plan payload.
pub fn skyportal_plan(
    id: i64,
    dateobs: &str,
    plan_name: &str,
    tiles: &[(i64, f64, f64, f64)],
) -> serde_json::Value {
    let observations: Vec<serde_json::Value> = tiles
        .iter()
        .map(|(tile, ra, dec, weight)| {
            serde_json::json!({
                "field": {"id": tile, "ra": ra, "dec": dec},
                "weight": weight,
                "exposure_time": 120,
                "filt": "R"
            })
        })
        .collect();
    serde_json::json!({
        "id": id,
        "plan_name": plan_name,
        "dateobs": dateobs,
        "created_at": dateobs,
        "requester": {"username": "grandma"},
        "planned_observations": observations
    })
}
