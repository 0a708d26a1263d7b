// ============================================================================
// SkyPortal Plan Parsing
// ============================================================================
//
// Converts an observation plan as returned by SkyPortal's
// `/api/observation_plan` endpoint into an `ObservingPlan`. Fields with
// out-of-range coordinates are rejected here, at the boundary, so the
// visibility filter only ever sees validated input.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{info, warn};

use crate::api::{
    self, ExposureParameters, Field, FieldId, ModifiedJulianDate, ObservingPlan, Period, PlanId,
    PlanStatus,
};
use crate::db::checksum::calculate_checksum;

#[derive(serde::Deserialize)]
struct PlanInput {
    id: i64,
    plan_name: String,
    dateobs: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    requester: Option<serde_json::Value>,
    #[serde(default)]
    planned_observations: Vec<PlannedObservationInput>,
    /// Observation window requested for the whole plan
    #[serde(default)]
    validity_window_start: Option<String>,
    #[serde(default)]
    validity_window_end: Option<String>,
}

#[derive(serde::Deserialize)]
struct PlannedObservationInput {
    field: FieldInput,
    #[serde(default)]
    weight: f64,
    #[serde(default = "default_exposure_time")]
    exposure_time: f64,
    #[serde(default = "default_filter")]
    filt: String,
}

#[derive(serde::Deserialize)]
struct FieldInput {
    id: i64,
    ra: f64,
    dec: f64,
}

fn default_exposure_time() -> f64 {
    120.0
}

fn default_filter() -> String {
    "R".to_string()
}

/// Knobs applied while turning a SkyPortal plan into an `ObservingPlan`.
#[derive(Debug, Clone)]
pub struct PlanParseOptions {
    /// Event name resolved from the GCN event aliases
    pub event_name: String,
    /// Plan-level priority assigned to the new plan
    pub priority: f64,
    /// Keep only the first N fields (0 = keep all)
    pub max_tiles: usize,
    /// Frames to acquire at every pointing
    pub frames: u32,
}

impl Default for PlanParseOptions {
    fn default() -> Self {
        Self {
            event_name: "Unknown".to_string(),
            priority: 0.0,
            max_tiles: 0,
            frames: 1,
        }
    }
}

/// Parse a SkyPortal observation plan payload.
///
/// # Arguments
///
/// * `raw` - One element of `data.requests[].observation_plans`
/// * `options` - Event name, priority and truncation settings
///
/// # Returns
///
/// A pending `ObservingPlan` whose fields keep SkyPortal's order, truncated to
/// `max_tiles` when non-zero, with the checksum of the raw payload.
pub fn parse_skyportal_plan(
    raw: &serde_json::Value,
    options: &PlanParseOptions,
) -> Result<ObservingPlan> {
    let input: PlanInput = serde_json::from_value(raw.clone())
        .context("Failed to deserialize SkyPortal observation plan")?;

    let validity = validity_window(&input);

    let mut fields = Vec::with_capacity(input.planned_observations.len());
    for obs in &input.planned_observations {
        let exposure = ExposureParameters::new(obs.filt.clone(), obs.exposure_time, options.frames);
        match Field::new(FieldId::new(obs.field.id), obs.field.ra, obs.field.dec, exposure) {
            Ok(field) => {
                let field = field.with_weight(obs.weight);
                fields.push(match validity {
                    Some(window) => field.with_validity(window),
                    None => field,
                });
            }
            Err(e) => warn!("Plan {}: skipping field: {}", input.plan_name, e),
        }
    }

    if options.max_tiles > 0 && fields.len() > options.max_tiles {
        info!(
            "Limiting number of fields to first {} from original {}",
            options.max_tiles,
            fields.len()
        );
        fields.truncate(options.max_tiles);
    }

    let created_at = input
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(ObservingPlan {
        id: PlanId::new(input.id),
        name: api::plan_basename(&input.dateobs, &input.plan_name),
        event_name: options.event_name.clone(),
        dateobs: input.dateobs,
        created_at,
        requester: input
            .requester
            .as_ref()
            .map(describe_requester)
            .unwrap_or_default(),
        priority: options.priority,
        status: PlanStatus::Pending,
        checksum: calculate_checksum(&raw.to_string()),
        fields,
    })
}

/// Plan-level validity window; both ends must parse and be ordered.
fn validity_window(input: &PlanInput) -> Option<Period> {
    let (start, end) = match (&input.validity_window_start, &input.validity_window_end) {
        (Some(start), Some(end)) => (start, end),
        (None, None) => return None,
        _ => {
            warn!("Plan {}: validity window has only one end, ignoring it", input.plan_name);
            return None;
        }
    };
    let window = parse_timestamp(start).zip(parse_timestamp(end)).and_then(|(start, end)| {
        Period::new(
            ModifiedJulianDate::from_datetime(start),
            ModifiedJulianDate::from_datetime(end),
        )
    });
    if window.is_none() {
        warn!(
            "Plan {}: invalid validity window {} .. {}, ignoring it",
            input.plan_name, start, end
        );
    }
    window
}

/// Storage name of a raw SkyPortal plan without parsing its fields.
pub fn skyportal_plan_basename(raw: &serde_json::Value) -> Option<String> {
    let dateobs = raw.get("dateobs")?.as_str()?;
    let plan_name = raw.get("plan_name")?.as_str()?;
    Some(api::plan_basename(dateobs, plan_name))
}

fn describe_requester(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(obj) => obj
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse the timestamps SkyPortal emits (naive UTC ISO strings, occasionally RFC 3339).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_plan() -> serde_json::Value {
        json!({
            "id": 417,
            "plan_name": "GRANDMA plan 1",
            "dateobs": "2023-05-20T10:11:12",
            "created_at": "2023-05-20T10:20:00.123",
            "requester": {"username": "grandma-bot"},
            "planned_observations": [
                {"field": {"id": 11, "ra": 10.5, "dec": -20.0}, "weight": 0.3, "exposure_time": 60, "filt": "B"},
                {"field": {"id": 12, "ra": 361.0, "dec": 5.0}, "weight": 0.2},
                {"field": {"id": 13, "ra": 200.0, "dec": 45.0}, "weight": 0.1}
            ]
        })
    }

    #[test]
    fn test_parse_plan_keeps_valid_fields() {
        let plan = parse_skyportal_plan(&sample_plan(), &PlanParseOptions::default()).unwrap();

        assert_eq!(plan.id, PlanId::new(417));
        assert_eq!(plan.name, "2023-05-20T10:11:12_GRANDMA_plan_1");
        assert_eq!(plan.requester, "grandma-bot");
        assert_eq!(plan.status, PlanStatus::Pending);
        // Field 12 has RA 361 and is rejected at the boundary
        let ids: Vec<i64> = plan.fields.iter().map(|f| f.id.value()).collect();
        assert_eq!(ids, vec![11, 13]);
        assert_eq!(plan.fields[0].exposure.filter, "B");
        assert_eq!(plan.fields[0].exposure.exposure_time.value(), 60.0);
        assert_eq!(plan.fields[1].exposure.filter, "R");
        assert_eq!(plan.fields[1].exposure.exposure_time.value(), 120.0);
        assert_eq!(plan.checksum.len(), 64);
    }

    #[test]
    fn test_parse_plan_truncates_to_max_tiles() {
        let options = PlanParseOptions {
            max_tiles: 1,
            event_name: "S230520ab".to_string(),
            priority: 3.0,
            frames: 2,
        };
        let plan = parse_skyportal_plan(&sample_plan(), &options).unwrap();
        assert_eq!(plan.fields.len(), 1);
        assert_eq!(plan.event_name, "S230520ab");
        assert_eq!(plan.priority, 3.0);
        assert_eq!(plan.fields[0].exposure.count, 2);
    }

    #[test]
    fn test_parse_plan_missing_required_field_fails() {
        let raw = json!({"plan_name": "x", "dateobs": "2023-05-20T10:11:12"});
        assert!(parse_skyportal_plan(&raw, &PlanParseOptions::default()).is_err());
    }

    #[test]
    fn test_parse_plan_reads_validity_window() {
        let mut raw = sample_plan();
        raw["validity_window_start"] = json!("2023-05-20T18:00:00");
        raw["validity_window_end"] = json!("2023-05-21T06:00:00");

        let plan = parse_skyportal_plan(&raw, &PlanParseOptions::default()).unwrap();
        let start = ModifiedJulianDate::from_datetime(Utc.with_ymd_and_hms(2023, 5, 20, 18, 0, 0).unwrap());
        let end = ModifiedJulianDate::from_datetime(Utc.with_ymd_and_hms(2023, 5, 21, 6, 0, 0).unwrap());
        for field in &plan.fields {
            let window = field.validity.expect("window set on every field");
            assert_eq!(window.start, start);
            assert_eq!(window.stop, end);
        }
    }

    #[test]
    fn test_parse_plan_ignores_unusable_validity_window() {
        let mut reversed = sample_plan();
        reversed["validity_window_start"] = json!("2023-05-21T06:00:00");
        reversed["validity_window_end"] = json!("2023-05-20T18:00:00");
        let mut half = sample_plan();
        half["validity_window_start"] = json!("2023-05-20T18:00:00");

        for raw in [reversed, half, sample_plan()] {
            let plan = parse_skyportal_plan(&raw, &PlanParseOptions::default()).unwrap();
            assert!(plan.fields.iter().all(|f| f.validity.is_none()));
        }
    }

    #[test]
    fn test_skyportal_plan_basename() {
        assert_eq!(
            skyportal_plan_basename(&sample_plan()).as_deref(),
            Some("2023-05-20T10:11:12_GRANDMA_plan_1")
        );
        assert_eq!(skyportal_plan_basename(&json!({})), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 5, 20, 10, 11, 12).unwrap();
        assert_eq!(parse_timestamp("2023-05-20T10:11:12"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-20T10:11:12Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-20 10:11:12"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
