//! Plan store trait.
//!
//! The store owns observing plans from the moment the listener fetches them
//! until the observer pass completes them or the visibility filter flags
//! them as expired.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{Field, ObservingPlan, PlanId, PlanStatus, PlanSummary};

/// Repository trait for observing plans.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so the listener, the observer and
/// the HTTP layer can share one store.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    // ==================== Health ====================

    /// Check that the backing storage is usable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Plan Operations ====================

    /// Store a newly fetched plan, replacing any plan with the same id.
    async fn store_plan(&self, plan: &ObservingPlan) -> RepositoryResult<PlanSummary>;

    /// Retrieve a plan with the fields still pending for it.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the plan doesn't exist
    async fn get_plan(&self, plan_id: PlanId) -> RepositoryResult<ObservingPlan>;

    /// Whether a plan with this storage name was already stored.
    async fn has_plan(&self, name: &str) -> RepositoryResult<bool>;

    /// All stored plans, newest trigger first.
    async fn list_plans(&self) -> RepositoryResult<Vec<PlanSummary>>;

    /// Pending and active plans with their remaining fields, newest trigger first.
    async fn list_pending_plans(&self) -> RepositoryResult<Vec<ObservingPlan>>;

    // ==================== Lifecycle ====================

    /// Replace the remaining fields of a plan.
    ///
    /// A plan left without fields is marked completed. Returns the new status.
    async fn update_fields(&self, plan_id: PlanId, fields: &[Field]) -> RepositoryResult<PlanStatus>;

    /// Set the status of a plan.
    async fn set_status(&self, plan_id: PlanId, status: PlanStatus) -> RepositoryResult<()>;

    /// Mark open plans as expired. Returns how many plans changed.
    ///
    /// Unknown ids and plans that are already closed are skipped.
    async fn mark_expired(&self, plan_ids: &[PlanId]) -> RepositoryResult<usize>;

    /// Retire the open plans of the same event (`dateobs`) other than `keep_name`.
    ///
    /// Their remaining fields are dropped and they are marked expired, so a
    /// refined plan for an event replaces the previous one. Returns how many
    /// plans were retired.
    async fn retire_superseded(&self, dateobs: &str, keep_name: &str) -> RepositoryResult<usize>;
}
