//! SkyPortal listener.
//!
//! Polls SkyPortal for new observation plans of the configured instrument,
//! stores them, retires older field lists of the same event and enables the
//! RTS2 target so the observer pass picks them up.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ModifiedJulianDate, ObserverLocation, ObservingPlan, PlanSummary};
use crate::clients::{PlanSource, TelescopeExecutor};
use crate::config::BridgeConfig;
use crate::db::PlanRepository;
use crate::error::BridgeResult;
use crate::models::plan::{
    parse_skyportal_plan, parse_timestamp, skyportal_plan_basename, PlanParseOptions,
};
use crate::services::horizon::HorizonProfile;
use crate::services::report::{plan_report, NightContext};

/// Event name used when SkyPortal cannot resolve the trigger.
pub const UNKNOWN_EVENT: &str = "Unknown";

/// Settings of the polling loop.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub instrument_id: i64,
    pub poll_delay: Duration,
    /// Plans whose trigger is older than this are ignored
    pub max_age_days: f64,
    pub max_tiles: usize,
    pub frames: u32,
    pub priority: f64,
    pub target_id: i64,
    /// Fixed site overriding the position reported by RTS2
    pub site: Option<ObserverLocation>,
    pub horizon: HorizonProfile,
    pub night_samples: usize,
}

impl ListenerOptions {
    pub fn from_config(config: &BridgeConfig, horizon: HorizonProfile) -> BridgeResult<Self> {
        Ok(Self {
            instrument_id: config.skyportal.instrument_id,
            poll_delay: Duration::from_secs(config.skyportal.poll_delay_secs),
            max_age_days: config.skyportal.max_age_days,
            max_tiles: config.skyportal.max_tiles,
            frames: config.observe.frames,
            priority: config.visibility.default_priority,
            target_id: config.rts2.target_id,
            site: config.site_location()?,
            horizon,
            night_samples: config.visibility.night_samples,
        })
    }
}

/// What one poll did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    /// Newly stored plans
    pub stored: Vec<PlanSummary>,
    /// Plans already in the store
    pub known: usize,
    /// Plans older than the maximum age
    pub too_old: usize,
    /// Payloads that could not be understood
    pub rejected: usize,
}

pub struct Listener {
    source: Arc<dyn PlanSource>,
    repo: Arc<dyn PlanRepository>,
    executor: Option<Arc<dyn TelescopeExecutor>>,
    options: ListenerOptions,
}

impl Listener {
    pub fn new(
        source: Arc<dyn PlanSource>,
        repo: Arc<dyn PlanRepository>,
        executor: Option<Arc<dyn TelescopeExecutor>>,
        options: ListenerOptions,
    ) -> Self {
        Self {
            source,
            repo,
            executor,
            options,
        }
    }

    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    /// Poll until `shutdown` resolves. Failed polls are logged and retried.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Polling SkyPortal for instrument_id {} every {} seconds",
            self.options.instrument_id,
            self.options.poll_delay.as_secs()
        );

        loop {
            match self.poll_once(Utc::now()).await {
                Ok(outcome) if !outcome.stored.is_empty() => {
                    info!("Stored {} new plans", outcome.stored.len())
                }
                Ok(_) => {}
                Err(e) => warn!("Polling SkyPortal failed: {:#}", e),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Listener stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.options.poll_delay) => {}
            }
        }
    }

    /// Fetch plans created during the last day and store the new ones.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<PollOutcome> {
        let start = now - ChronoDuration::days(1);
        let plans = self
            .source
            .fetch_observation_plans(self.options.instrument_id, start, now)
            .await
            .context("Failed to request observation plans")?;
        debug!("SkyPortal returned {} plans", plans.len());

        let mut outcome = PollOutcome::default();
        for raw in &plans {
            let Some(name) = skyportal_plan_basename(raw) else {
                warn!("Ignoring plan without dateobs or plan_name");
                outcome.rejected += 1;
                continue;
            };

            if self.repo.has_plan(&name).await? {
                outcome.known += 1;
                continue;
            }

            let dateobs = raw["dateobs"].as_str().unwrap_or_default();
            let Some(trigger) = parse_timestamp(dateobs) else {
                warn!("Plan {}: cannot parse trigger time '{}'", name, dateobs);
                outcome.rejected += 1;
                continue;
            };
            let age_days = (now - trigger).num_milliseconds() as f64 / 86_400_000.0;
            if age_days > self.options.max_age_days {
                info!(
                    "{:.2} days since event trigger, skipping plan {}",
                    age_days, name
                );
                outcome.too_old += 1;
                continue;
            }

            match self.ingest(raw, dateobs, now).await {
                Ok(summary) => outcome.stored.push(summary),
                Err(e) => {
                    warn!("Plan {}: {:#}", name, e);
                    outcome.rejected += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn ingest(
        &self,
        raw: &serde_json::Value,
        dateobs: &str,
        now: DateTime<Utc>,
    ) -> Result<PlanSummary> {
        let event_name = match self.source.fetch_event_name(dateobs).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Error requesting event information from SkyPortal: {}", e);
                UNKNOWN_EVENT.to_string()
            }
        };

        let plan = parse_skyportal_plan(
            raw,
            &PlanParseOptions {
                event_name,
                priority: self.options.priority,
                max_tiles: self.options.max_tiles,
                frames: self.options.frames,
            },
        )?;
        info!(
            "New plan {} / {} for event {} - {} fields",
            plan.id,
            plan.name,
            plan.event_name,
            plan.fields.len()
        );

        let summary = self
            .repo
            .store_plan(&plan)
            .await
            .context("Failed to store plan")?;

        let retired = self.repo.retire_superseded(&plan.dateobs, &plan.name).await?;
        if retired > 0 {
            info!("Retired {} older plans for the same event", retired);
        }

        if !plan.fields.is_empty() {
            self.notify_telescope(&plan, now).await;
        }
        Ok(summary)
    }

    /// Enable the observing target and log the night visibility of the new plan.
    ///
    /// Telescope problems never fail ingestion: the plan is already stored.
    async fn notify_telescope(&self, plan: &ObservingPlan, now: DateTime<Utc>) {
        let now = ModifiedJulianDate::from_datetime(now);
        let Some(executor) = &self.executor else {
            info!("\n{}", plan_report(plan, None, now));
            return;
        };

        if let Err(e) = executor.set_target_enabled(self.options.target_id, true).await {
            warn!("Error enabling target {}: {}", self.options.target_id, e);
        }

        let context = match executor.site_state().await {
            Ok(site) => Some(NightContext {
                location: self.options.site.unwrap_or(site.location),
                night: site.night,
                horizon: &self.options.horizon,
                samples: self.options.night_samples,
            }),
            Err(e) => {
                warn!("Cannot compute tiles visibility: {}", e);
                None
            }
        };
        info!("\n{}", plan_report(plan, context.as_ref(), now));
    }
}
