//! One observation pass over the pending plans.
//!
//! The pass ranks every observable field across pending plans, points and
//! exposes the best ones, and prunes the store:
//!
//! 1. plans that can no longer be observed in their windows are expired
//! 2. up to `max_pointings` ranked fields clear of the local horizon are observed
//! 3. observed fields and fields unobservable for the rest of the night are
//!    dropped from their plans; emptied plans complete, started ones turn active
//! 4. the scheduler target is disabled once nothing is left to observe

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::api::{
    ExposureParameters, Field, FieldId, ModifiedJulianDate, ObserverLocation, PlanId, PlanStatus,
};
use crate::clients::TelescopeExecutor;
use crate::config::BridgeConfig;
use crate::db::PlanRepository;
use crate::error::BridgeResult;
use crate::services::horizon::HorizonProfile;
use crate::services::report::{classify_night, NightWindow};
use crate::services::visibility::VisibilityFilter;

/// Prefix of the OBJECT value given to frames of plan fields.
pub const OBJECT_PREFIX: &str = "GRANDMA";

/// OBJECT header value for a field: `GRANDMA_<event>_<tile>`.
pub fn object_name(event_name: &str, field_id: FieldId) -> String {
    format!("{}_{}_{}", OBJECT_PREFIX, event_name, field_id)
}

/// Settings of an observation pass.
#[derive(Debug, Clone)]
pub struct ObserveOptions {
    /// Pointings to visit before stopping
    pub max_pointings: usize,
    /// Exposure applied at every pointing
    pub exposure: ExposureParameters,
    pub target_id: i64,
    pub min_altitude: qtty::Degrees,
    /// Instants sampled across the night when deciding to drop a field
    pub night_samples: usize,
    /// Fixed site overriding the position reported by RTS2
    pub site: Option<ObserverLocation>,
}

/// Night samples used by the observer, coarser than the report.
pub const OBSERVER_NIGHT_SAMPLES: usize = 10;

impl ObserveOptions {
    pub fn from_config(config: &BridgeConfig) -> BridgeResult<Self> {
        Ok(Self {
            max_pointings: config.observe.max_pointings,
            exposure: ExposureParameters::new(
                config.observe.filter.clone(),
                config.observe.exposure,
                config.observe.frames,
            ),
            target_id: config.rts2.target_id,
            min_altitude: config.min_altitude(),
            night_samples: OBSERVER_NIGHT_SAMPLES,
            site: config.site_location()?,
        })
    }
}

/// A field visited during the pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub plan_id: PlanId,
    pub field_id: FieldId,
    pub object: String,
}

/// What a pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassOutcome {
    pub observed: Vec<Observation>,
    /// Fields removed because they cannot be observed tonight
    pub dropped: Vec<(PlanId, FieldId)>,
    /// Pointings that failed and were skipped
    pub pointing_failures: usize,
    pub expired: Vec<PlanId>,
    pub completed: Vec<PlanId>,
    pub target_disabled: bool,
}

/// Run one observation pass at `now`.
pub async fn observe_pass(
    repo: &dyn PlanRepository,
    executor: &dyn TelescopeExecutor,
    horizon: &HorizonProfile,
    options: &ObserveOptions,
    now: ModifiedJulianDate,
) -> Result<PassOutcome> {
    let site = executor
        .site_state()
        .await
        .context("Failed to request site state from RTS2")?;
    let location = options.site.unwrap_or(site.location);
    let filter = VisibilityFilter::new(Some(location), options.min_altitude)?;

    let mut outcome = PassOutcome::default();
    let pending = repo.list_pending_plans().await?;

    let expired = filter.expired(&pending, now);
    if !expired.is_empty() {
        let ids: Vec<PlanId> = expired.iter().copied().collect();
        repo.mark_expired(&ids).await?;
        outcome.expired = ids;
    }
    let plans: Vec<_> = pending
        .into_iter()
        .filter(|plan| !expired.contains(&plan.id))
        .collect();

    let mut visited: BTreeSet<(PlanId, FieldId)> = BTreeSet::new();
    for ranked in filter.rank(&plans, now) {
        if outcome.observed.len() >= options.max_pointings {
            info!(
                "Visited {} pointings, stopping for now",
                outcome.observed.len()
            );
            break;
        }
        if !horizon.is_clear(&ranked.visibility.alt_az) {
            debug!(
                "Field {} of plan {} is above the altitude limit but behind the local horizon",
                ranked.field.id, ranked.plan_id
            );
            continue;
        }

        info!(
            "Pointing to event {} grid point {} with weight {} at {:.4} {:.4}",
            ranked.event_name,
            ranked.field.id,
            ranked.field.weight,
            ranked.field.ra.value(),
            ranked.field.dec.value()
        );
        if let Err(e) = executor.point(ranked.field.ra, ranked.field.dec).await {
            warn!("Repointing error, moving to next pointing: {}", e);
            outcome.pointing_failures += 1;
            continue;
        }

        let object = object_name(&ranked.event_name, ranked.field.id);
        if let Err(e) = executor.expose(&object, &options.exposure).await {
            warn!("Exposure error at {}: {}", object, e);
        }

        visited.insert((ranked.plan_id, ranked.field.id));
        outcome.observed.push(Observation {
            plan_id: ranked.plan_id,
            field_id: ranked.field.id,
            object,
        });
    }

    for plan in &plans {
        if plan.fields.is_empty() {
            info!("Plan {} has no pointings left, closing it", plan.name);
            if repo.update_fields(plan.id, &[]).await? == PlanStatus::Completed {
                outcome.completed.push(plan.id);
            }
            continue;
        }

        let mut remaining = Vec::with_capacity(plan.fields.len());
        let mut changed = false;
        let mut started = false;
        for field in &plan.fields {
            if visited.contains(&(plan.id, field.id)) {
                changed = true;
                started = true;
                continue;
            }
            let position = filter.alt_az(field, now);
            if !horizon.is_clear(&position)
                && lost_for_window(field, &location, horizon, &site.night, now, options.night_samples)
            {
                info!(
                    "Pointing {} of event {} is not observable tonight, removing it",
                    field.id, plan.event_name
                );
                outcome.dropped.push((plan.id, field.id));
                changed = true;
                continue;
            }
            remaining.push(field.clone());
        }

        if changed {
            let status = repo.update_fields(plan.id, &remaining).await?;
            if status == PlanStatus::Completed {
                info!("All pointings for event {} observed, removing its plan", plan.event_name);
                outcome.completed.push(plan.id);
            } else {
                info!(
                    "Pointings left for event {}: {}",
                    plan.event_name,
                    remaining.len()
                );
                if started && status == PlanStatus::Pending {
                    repo.set_status(plan.id, PlanStatus::Active).await?;
                }
            }
        }
    }

    let left = remaining_fields_by_plan(repo).await?;
    if left.values().all(|&count| count == 0) {
        info!("No more plans to observe, disabling the target");
        executor
            .set_target_enabled(options.target_id, false)
            .await
            .context("Failed to disable the observing target")?;
        outcome.target_disabled = true;
    }

    Ok(outcome)
}

/// Whether a field behind the horizon now can leave its plan.
///
/// Without a validity window the field goes once it cannot be seen tonight.
/// A windowed field waits for its window to open, and inside it goes only
/// when tonight is the last night the window covers.
fn lost_for_window(
    field: &Field,
    location: &ObserverLocation,
    horizon: &HorizonProfile,
    night: &NightWindow,
    now: ModifiedJulianDate,
    samples: usize,
) -> bool {
    if let Some(window) = field.validity {
        if window.has_elapsed(now) {
            return true;
        }
        if window.start.value() > now.value() {
            return false;
        }
        if window.stop.value() > ModifiedJulianDate::from_datetime(night.end).value() {
            return false;
        }
    }
    !classify_night(field, location, horizon, night, now, samples).observable_tonight()
}

async fn remaining_fields_by_plan(repo: &dyn PlanRepository) -> Result<BTreeMap<PlanId, usize>> {
    Ok(repo
        .list_pending_plans()
        .await?
        .iter()
        .map(|plan| (plan.id, plan.fields.len()))
        .collect())
}
