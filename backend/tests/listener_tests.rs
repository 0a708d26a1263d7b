//! Listener polls against a scripted SkyPortal.

mod support;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use qtty::Degrees;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fram_bridge::api::{PlanId, PlanStatus};
use fram_bridge::clients::{
    ClientError, DryRunExecutor, ExecutorCommand, PlanSource, TelescopeExecutor,
};
use fram_bridge::db::{LocalRepository, PlanRepository};
use fram_bridge::services::{HorizonProfile, Listener, ListenerOptions};
use support::{skyportal_plan, teide_site};

#[derive(Default)]
struct ScriptedSkyPortal {
    plans: Mutex<Vec<Value>>,
    events: HashMap<String, String>,
    requests: Mutex<Vec<(i64, DateTime<Utc>, DateTime<Utc>)>>,
}

impl ScriptedSkyPortal {
    fn with_event(mut self, dateobs: &str, name: &str) -> Self {
        self.events.insert(dateobs.to_string(), name.to_string());
        self
    }

    fn publish(&self, plan: Value) {
        self.plans.lock().push(plan);
    }
}

#[async_trait]
impl PlanSource for ScriptedSkyPortal {
    async fn fetch_observation_plans(
        &self,
        instrument_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>, ClientError> {
        self.requests.lock().push((instrument_id, start, end));
        Ok(self.plans.lock().clone())
    }

    async fn fetch_event_name(&self, dateobs: &str) -> Result<String, ClientError> {
        self.events
            .get(dateobs)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(dateobs.to_string()))
    }
}

fn options() -> ListenerOptions {
    ListenerOptions {
        instrument_id: 22,
        poll_delay: Duration::from_secs(10),
        max_age_days: 1.0,
        max_tiles: 0,
        frames: 1,
        priority: 0.0,
        target_id: 50,
        site: None,
        horizon: HorizonProfile::flat(Degrees::new(20.0)),
        night_samples: 50,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 19, 18, 0, 0).unwrap()
}

const TRIGGER: &str = "2024-03-19T12:00:00";

struct Harness {
    source: Arc<ScriptedSkyPortal>,
    repo: Arc<LocalRepository>,
    executor: Arc<DryRunExecutor>,
    listener: Listener,
}

fn harness(source: ScriptedSkyPortal, options: ListenerOptions) -> Harness {
    let source = Arc::new(source);
    let repo = Arc::new(LocalRepository::new());
    let executor = Arc::new(DryRunExecutor::new(Some(teide_site())));
    let listener = Listener::new(
        source.clone() as Arc<dyn PlanSource>,
        repo.clone() as Arc<dyn PlanRepository>,
        Some(executor.clone() as Arc<dyn TelescopeExecutor>),
        options,
    );
    Harness {
        source,
        repo,
        executor,
        listener,
    }
}

#[tokio::test]
async fn test_new_plan_is_stored_and_target_enabled() {
    let h = harness(ScriptedSkyPortal::default().with_event(TRIGGER, "S240319a"), options());
    h.source.publish(skyportal_plan(
        7,
        TRIGGER,
        "GRANDMA plan",
        &[(1, 180.0, 28.0, 0.5), (2, 90.0, 20.0, 0.2)],
    ));

    let outcome = h.listener.poll_once(now()).await.unwrap();

    assert_eq!(outcome.stored.len(), 1);
    let summary = &outcome.stored[0];
    assert_eq!(summary.plan_id, PlanId::new(7));
    assert_eq!(summary.name, "2024-03-19T12:00:00_GRANDMA_plan");
    assert_eq!(summary.event_name, "S240319a");
    assert_eq!(summary.field_count, 2);

    assert!(h.repo.has_plan("2024-03-19T12:00:00_GRANDMA_plan").await.unwrap());
    assert_eq!(
        h.executor.commands(),
        vec![ExecutorCommand::SetTargetEnabled {
            target_id: 50,
            enabled: true
        }]
    );

    let requests = h.source.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, 22);
    assert_eq!(requests[0].2 - requests[0].1, chrono::Duration::days(1));
}

#[tokio::test]
async fn test_known_plans_are_not_stored_twice() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source
        .publish(skyportal_plan(7, TRIGGER, "GRANDMA", &[(1, 180.0, 28.0, 0.5)]));

    assert_eq!(h.listener.poll_once(now()).await.unwrap().stored.len(), 1);
    let second = h.listener.poll_once(now()).await.unwrap();
    assert!(second.stored.is_empty());
    assert_eq!(second.known, 1);
    assert_eq!(h.repo.plan_count(), 1);
}

#[tokio::test]
async fn test_old_plans_are_skipped() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source.publish(skyportal_plan(
        8,
        "2024-03-17T12:00:00",
        "GRANDMA",
        &[(1, 180.0, 28.0, 0.5)],
    ));

    let outcome = h.listener.poll_once(now()).await.unwrap();
    assert!(outcome.stored.is_empty());
    assert_eq!(outcome.too_old, 1);
    assert_eq!(h.repo.plan_count(), 0);
}

#[tokio::test]
async fn test_unresolved_event_is_unknown() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source
        .publish(skyportal_plan(9, TRIGGER, "GRANDMA", &[(1, 180.0, 28.0, 0.5)]));

    let outcome = h.listener.poll_once(now()).await.unwrap();
    assert_eq!(outcome.stored[0].event_name, "Unknown");
}

#[tokio::test]
async fn test_max_tiles_truncates_plan() {
    let mut opts = options();
    opts.max_tiles = 2;
    let h = harness(ScriptedSkyPortal::default(), opts);
    h.source.publish(skyportal_plan(
        10,
        TRIGGER,
        "GRANDMA",
        &[
            (1, 10.0, 0.0, 0.4),
            (2, 20.0, 0.0, 0.3),
            (3, 30.0, 0.0, 0.2),
        ],
    ));

    let outcome = h.listener.poll_once(now()).await.unwrap();
    assert_eq!(outcome.stored[0].field_count, 2);
}

#[tokio::test]
async fn test_revised_plan_retires_previous_one() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source
        .publish(skyportal_plan(11, TRIGGER, "GRANDMA 1", &[(1, 180.0, 28.0, 0.5)]));
    h.listener.poll_once(now()).await.unwrap();

    h.source
        .publish(skyportal_plan(12, TRIGGER, "GRANDMA 2", &[(2, 180.0, 30.0, 0.5)]));
    let outcome = h.listener.poll_once(now()).await.unwrap();

    assert_eq!(outcome.stored.len(), 1);
    assert_eq!(outcome.known, 1);
    assert_eq!(
        h.repo.get_plan(PlanId::new(11)).await.unwrap().status,
        PlanStatus::Expired
    );
    let pending: Vec<PlanId> = h
        .repo
        .list_pending_plans()
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(pending, vec![PlanId::new(12)]);
}

#[tokio::test]
async fn test_empty_plan_does_not_enable_target() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source.publish(skyportal_plan(13, TRIGGER, "GRANDMA", &[]));

    let outcome = h.listener.poll_once(now()).await.unwrap();
    assert_eq!(outcome.stored.len(), 1);
    assert!(h.executor.commands().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let h = harness(ScriptedSkyPortal::default(), options());
    h.source.publish(serde_json::json!({"id": 14}));

    let outcome = h.listener.poll_once(now()).await.unwrap();
    assert_eq!(outcome.rejected, 1);
    assert!(outcome.stored.is_empty());
}
