//! In-memory local repository implementation.
//!
//! Suitable for unit tests and dry runs: plans live in a map behind a
//! `parking_lot::RwLock` and vanish with the process.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{Field, ObservingPlan, PlanId, PlanStatus, PlanSummary};
use crate::db::repository::{ErrorContext, PlanRepository, RepositoryError, RepositoryResult};

/// In-memory local repository.
///
/// # Example
/// ```
/// use fram_bridge::db::repositories::LocalRepository;
/// use fram_bridge::db::repository::PlanRepository;
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// runtime.block_on(async {
///     let repo = LocalRepository::new();
///     assert!(repo.list_plans().await.unwrap().is_empty());
/// });
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Default)]
struct LocalData {
    plans: BTreeMap<PlanId, ObservingPlan>,
    unhealthy: bool,
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the health status for testing storage failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().unhealthy = !healthy;
    }

    /// Number of stored plans.
    pub fn plan_count(&self) -> usize {
        self.data.read().plans.len()
    }

    fn check_health(&self, operation: &str) -> RepositoryResult<()> {
        if self.data.read().unhealthy {
            return Err(RepositoryError::storage_with_context(
                "Local repository is not healthy",
                ErrorContext::new(operation),
            ));
        }
        Ok(())
    }

    fn with_plan_mut<T>(
        &self,
        operation: &str,
        plan_id: PlanId,
        f: impl FnOnce(&mut ObservingPlan) -> T,
    ) -> RepositoryResult<T> {
        self.check_health(operation)?;
        let mut data = self.data.write();
        let plan = data.plans.get_mut(&plan_id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Plan {} not found", plan_id),
                ErrorContext::new(operation)
                    .with_entity("plan")
                    .with_entity_id(plan_id),
            )
        })?;
        Ok(f(plan))
    }
}

fn newest_first(a: &ObservingPlan, b: &ObservingPlan) -> std::cmp::Ordering {
    b.name.cmp(&a.name)
}

#[async_trait]
impl PlanRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(!self.data.read().unhealthy)
    }

    async fn store_plan(&self, plan: &ObservingPlan) -> RepositoryResult<PlanSummary> {
        self.check_health("store_plan")?;
        self.data.write().plans.insert(plan.id, plan.clone());
        Ok(PlanSummary::from(plan))
    }

    async fn get_plan(&self, plan_id: PlanId) -> RepositoryResult<ObservingPlan> {
        self.with_plan_mut("get_plan", plan_id, |plan| plan.clone())
    }

    async fn has_plan(&self, name: &str) -> RepositoryResult<bool> {
        self.check_health("has_plan")?;
        Ok(self.data.read().plans.values().any(|p| p.name == name))
    }

    async fn list_plans(&self) -> RepositoryResult<Vec<PlanSummary>> {
        self.check_health("list_plans")?;
        let data = self.data.read();
        let mut plans: Vec<&ObservingPlan> = data.plans.values().collect();
        plans.sort_by(|a, b| newest_first(a, b));
        Ok(plans.into_iter().map(PlanSummary::from).collect())
    }

    async fn list_pending_plans(&self) -> RepositoryResult<Vec<ObservingPlan>> {
        self.check_health("list_pending_plans")?;
        let data = self.data.read();
        let mut plans: Vec<ObservingPlan> = data
            .plans
            .values()
            .filter(|p| p.status.is_open())
            .cloned()
            .collect();
        plans.sort_by(newest_first);
        Ok(plans)
    }

    async fn update_fields(&self, plan_id: PlanId, fields: &[Field]) -> RepositoryResult<PlanStatus> {
        self.with_plan_mut("update_fields", plan_id, |plan| {
            plan.fields = fields.to_vec();
            if plan.fields.is_empty() {
                plan.status = PlanStatus::Completed;
            }
            plan.status
        })
    }

    async fn set_status(&self, plan_id: PlanId, status: PlanStatus) -> RepositoryResult<()> {
        self.with_plan_mut("set_status", plan_id, |plan| plan.status = status)
    }

    async fn mark_expired(&self, plan_ids: &[PlanId]) -> RepositoryResult<usize> {
        self.check_health("mark_expired")?;
        let mut data = self.data.write();
        let mut changed = 0;
        for id in plan_ids {
            if let Some(plan) = data.plans.get_mut(id) {
                if plan.status.is_open() {
                    plan.status = PlanStatus::Expired;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn retire_superseded(&self, dateobs: &str, keep_name: &str) -> RepositoryResult<usize> {
        self.check_health("retire_superseded")?;
        let mut data = self.data.write();
        let mut retired = 0;
        for plan in data.plans.values_mut() {
            if plan.dateobs == dateobs && plan.name != keep_name && plan.status.is_open() {
                plan.fields.clear();
                plan.status = PlanStatus::Expired;
                retired += 1;
            }
        }
        Ok(retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ExposureParameters, FieldId};
    use chrono::{TimeZone, Utc};

    fn plan(id: i64, name: &str, field_ids: &[i64]) -> ObservingPlan {
        ObservingPlan {
            id: PlanId::new(id),
            name: name.to_string(),
            event_name: "S240319a".to_string(),
            dateobs: "2024-03-19T12:00:00".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 19, 12, 30, 0).unwrap(),
            requester: "grandma".to_string(),
            priority: 0.0,
            status: PlanStatus::Pending,
            checksum: String::new(),
            fields: field_ids
                .iter()
                .map(|&fid| {
                    Field::new(FieldId::new(fid), 10.0, 20.0, ExposureParameters::default())
                        .unwrap()
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());

        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        let err = repo.list_plans().await.unwrap_err();
        assert_eq!(err.context().operation.as_deref(), Some("list_plans"));
    }

    #[tokio::test]
    async fn test_store_and_retrieve_plan() {
        let repo = LocalRepository::new();
        let summary = repo
            .store_plan(&plan(1, "2024-03-19T12:00:00_GRANDMA", &[1, 2]))
            .await
            .unwrap();
        assert_eq!(summary.field_count, 2);

        let retrieved = repo.get_plan(PlanId::new(1)).await.unwrap();
        assert_eq!(retrieved.fields.len(), 2);
        assert!(repo.has_plan("2024-03-19T12:00:00_GRANDMA").await.unwrap());
        assert!(matches!(
            repo.get_plan(PlanId::new(2)).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_fields_completes_empty_plan() {
        let repo = LocalRepository::new();
        repo.store_plan(&plan(1, "a", &[1, 2])).await.unwrap();

        let keep = repo.get_plan(PlanId::new(1)).await.unwrap().fields[1..].to_vec();
        assert_eq!(
            repo.update_fields(PlanId::new(1), &keep).await.unwrap(),
            PlanStatus::Pending
        );
        assert_eq!(
            repo.update_fields(PlanId::new(1), &[]).await.unwrap(),
            PlanStatus::Completed
        );
        assert!(repo.list_pending_plans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_expired_only_counts_open_plans() {
        let repo = LocalRepository::new();
        repo.store_plan(&plan(1, "a", &[1])).await.unwrap();
        repo.store_plan(&plan(2, "b", &[1])).await.unwrap();
        repo.set_status(PlanId::new(2), PlanStatus::Completed)
            .await
            .unwrap();

        let changed = repo
            .mark_expired(&[PlanId::new(1), PlanId::new(2), PlanId::new(3)])
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            repo.get_plan(PlanId::new(1)).await.unwrap().status,
            PlanStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_retire_superseded_keeps_newest() {
        let repo = LocalRepository::new();
        repo.store_plan(&plan(1, "2024-03-19T12:00:00_GRANDMA_1", &[1]))
            .await
            .unwrap();
        repo.store_plan(&plan(2, "2024-03-19T12:00:00_GRANDMA_2", &[1]))
            .await
            .unwrap();

        let retired = repo
            .retire_superseded("2024-03-19T12:00:00", "2024-03-19T12:00:00_GRANDMA_2")
            .await
            .unwrap();
        assert_eq!(retired, 1);

        let pending = repo.list_pending_plans().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, PlanId::new(2));
        assert!(repo.get_plan(PlanId::new(1)).await.unwrap().fields.is_empty());
    }
}
