//! Night visibility report for stored plans.
//!
//! Each field is sampled across tonight's window against the local horizon
//! profile and classified into one of four outcomes. The text rendering is
//! what the listener logs when a new plan arrives and what `plans` prints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Field, FieldId, ModifiedJulianDate, ObserverLocation, ObservingPlan};
use crate::services::horizon::HorizonProfile;
use crate::services::visibility::compute_alt_az;

const SECONDS_PER_DAY: f64 = 86400.0;

/// Tonight's observing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NightWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NightWindow {
    /// Build from RTS2 `night_beginning` / `night_ending` (unix seconds).
    ///
    /// During the night RTS2 already reports the next night's beginning, so a
    /// beginning after the end is moved back by one day.
    pub fn from_unix(mut begin: f64, end: f64) -> Self {
        if end < begin {
            begin -= SECONDS_PER_DAY;
        }
        Self {
            begin: ModifiedJulianDate::from_unix_timestamp(begin).to_datetime(),
            end: ModifiedJulianDate::from_unix_timestamp(end).to_datetime(),
        }
    }

    /// `count` evenly spaced instants from begin to end, both included.
    pub fn samples(&self, count: usize) -> Vec<ModifiedJulianDate> {
        let t1 = ModifiedJulianDate::from_datetime(self.begin).value();
        let t2 = ModifiedJulianDate::from_datetime(self.end).value();
        match count {
            0 => Vec::new(),
            1 => vec![ModifiedJulianDate::new(t1)],
            n => (0..n)
                .map(|i| ModifiedJulianDate::new(t1 + (t2 - t1) * i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

/// Where a field stands for the rest of the night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "time", rename_all = "snake_case")]
pub enum NightVisibility {
    /// Clear of the horizon now and at some sample until the given time
    VisibleUntil(DateTime<Utc>),
    /// Clear of the horizon now but at no sample of the night
    VisibleNowOnly,
    /// Not clear now, first clear sample at the given time
    VisibleSince(DateTime<Utc>),
    /// Not clear now nor at any sample of the night
    UnobservableTonight,
}

impl NightVisibility {
    /// True when the field should be kept for a later pass tonight.
    pub fn observable_tonight(&self) -> bool {
        matches!(
            self,
            NightVisibility::VisibleUntil(_) | NightVisibility::VisibleSince(_)
        )
    }
}

impl fmt::Display for NightVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NightVisibility::VisibleUntil(t) => {
                write!(f, "visible now and until {}", t.format("%H:%M:%S UT"))
            }
            NightVisibility::VisibleNowOnly => f.write_str("visible now but unobservable tonight"),
            NightVisibility::VisibleSince(t) => {
                write!(f, "visible since {}", t.format("%H:%M:%S UT"))
            }
            NightVisibility::UnobservableTonight => f.write_str("unobservable tonight"),
        }
    }
}

/// Classify one field for the night.
pub fn classify_night(
    field: &Field,
    location: &ObserverLocation,
    horizon: &HorizonProfile,
    night: &NightWindow,
    now: ModifiedJulianDate,
    samples: usize,
) -> NightVisibility {
    let clear_at = |t: ModifiedJulianDate| horizon.is_clear(&compute_alt_az(field, location, t));

    let visible_now = clear_at(now);
    let clear: Vec<ModifiedJulianDate> = night
        .samples(samples)
        .into_iter()
        .filter(|&t| clear_at(t))
        .collect();

    match (visible_now, clear.first(), clear.last()) {
        (true, Some(_), Some(last)) => NightVisibility::VisibleUntil(last.to_datetime()),
        (true, _, _) => NightVisibility::VisibleNowOnly,
        (false, Some(first), _) => NightVisibility::VisibleSince(first.to_datetime()),
        (false, None, _) => NightVisibility::UnobservableTonight,
    }
}

/// One line of a plan report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field_id: FieldId,
    pub weight: f64,
    pub ra: f64,
    pub dec: f64,
    /// Absent when no site information was available
    pub night: Option<NightVisibility>,
}

/// Night visibility of every field of a plan, highest weight first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub name: String,
    pub event_name: String,
    pub fields: Vec<FieldReport>,
}

/// Site information needed to classify fields.
#[derive(Debug, Clone)]
pub struct NightContext<'a> {
    pub location: ObserverLocation,
    pub night: NightWindow,
    pub horizon: &'a HorizonProfile,
    pub samples: usize,
}

/// Build the report for a plan; without a night context only positions are listed.
pub fn plan_report(
    plan: &ObservingPlan,
    context: Option<&NightContext<'_>>,
    now: ModifiedJulianDate,
) -> PlanReport {
    let mut fields: Vec<FieldReport> = plan
        .fields
        .iter()
        .map(|field| FieldReport {
            field_id: field.id,
            weight: field.weight,
            ra: field.ra.value(),
            dec: field.dec.value(),
            night: context.map(|ctx| {
                classify_night(field, &ctx.location, ctx.horizon, &ctx.night, now, ctx.samples)
            }),
        })
        .collect();
    fields.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    PlanReport {
        name: plan.name.clone(),
        event_name: plan.event_name.clone(),
        fields,
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: GRANDMA plan with {} pointings for event {}",
            self.name,
            self.fields.len(),
            self.event_name
        )?;
        for entry in &self.fields {
            write!(
                f,
                " |- grid point {} with weight {:.2} at {:.2} {:.2}",
                entry.field_id, entry.weight, entry.ra, entry.dec
            )?;
            if let Some(night) = &entry.night {
                write!(f, ": {}", night)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
