//! Plan store on the local filesystem.
//!
//! Each plan is kept as two files under the storage root:
//!
//! - `<name>.json`: the plan document (metadata, status and the full field list
//!   as fetched, including validity windows)
//! - `<name>.fields`: the fields still to be observed, as a commented-header
//!   table the telescope operators can read and edit by hand
//!
//! A plan without a `.fields` file has nothing left to observe.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::api::{Field, FieldId, ObservingPlan, PlanId, PlanStatus, PlanSummary};
use crate::db::repository::{ErrorContext, PlanRepository, RepositoryError, RepositoryResult};
use crate::parsing::fields_parser::{parse_fields_str, write_fields_str};

const PLAN_EXTENSION: &str = "json";
const FIELDS_EXTENSION: &str = "fields";

/// Filesystem-backed plan store.
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    root: PathBuf,
}

/// A plan document loaded from disk with its location.
struct StoredPlan {
    json_path: PathBuf,
    plan: ObservingPlan,
}

impl StoredPlan {
    fn fields_path(&self) -> PathBuf {
        self.json_path.with_extension(FIELDS_EXTENSION)
    }
}

impl FileSystemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn json_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, PLAN_EXTENSION))
    }

    async fn ensure_root(&self, operation: &str) -> RepositoryResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            RepositoryError::storage_with_context(
                e.to_string(),
                ErrorContext::new(operation).with_path(&self.root),
            )
        })
    }

    /// Every plan document under the root, newest trigger first.
    async fn load_all(&self, operation: &str) -> RepositoryResult<Vec<StoredPlan>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepositoryError::from(e).with_operation(operation)),
        };

        let mut plans = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::from(e).with_operation(operation))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PLAN_EXTENSION) {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| RepositoryError::from(e).with_operation(operation))?;
            let plan: ObservingPlan = serde_json::from_str(&content).map_err(|e| {
                RepositoryError::serialization_with_context(
                    e.to_string(),
                    ErrorContext::new(operation)
                        .with_entity("plan")
                        .with_path(&path),
                )
            })?;
            plans.push(StoredPlan {
                json_path: path,
                plan,
            });
        }

        plans.sort_by(|a, b| b.plan.name.cmp(&a.plan.name));
        Ok(plans)
    }

    async fn find(&self, operation: &str, plan_id: PlanId) -> RepositoryResult<StoredPlan> {
        self.load_all(operation)
            .await?
            .into_iter()
            .find(|stored| stored.plan.id == plan_id)
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Plan {} not found", plan_id),
                    ErrorContext::new(operation)
                        .with_entity("plan")
                        .with_entity_id(plan_id),
                )
            })
    }

    /// Fields still pending for a stored plan.
    ///
    /// The table carries no validity windows, so they are restored from the
    /// plan document by field id.
    async fn remaining_fields(&self, stored: &StoredPlan) -> RepositoryResult<Vec<Field>> {
        let path = stored.fields_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepositoryError::from(e).with_operation("read_fields")),
        };
        let mut fields = parse_fields_str(&content).map_err(|e| {
            RepositoryError::serialization_with_context(
                format!("{:#}", e),
                ErrorContext::new("read_fields")
                    .with_entity("fields")
                    .with_path(&path),
            )
        })?;

        let windows: HashMap<FieldId, _> = stored
            .plan
            .fields
            .iter()
            .filter_map(|f| f.validity.map(|w| (f.id, w)))
            .collect();
        for field in &mut fields {
            field.validity = windows.get(&field.id).copied();
        }
        Ok(fields)
    }

    async fn with_remaining(&self, stored: StoredPlan) -> RepositoryResult<ObservingPlan> {
        let fields = self.remaining_fields(&stored).await?;
        let mut plan = stored.plan;
        plan.fields = fields;
        Ok(plan)
    }

    async fn write_document(&self, path: &Path, plan: &ObservingPlan) -> RepositoryResult<()> {
        let json = serde_json::to_string_pretty(plan)?;
        tokio::fs::write(path, json).await.map_err(|e| {
            RepositoryError::storage_with_context(
                e.to_string(),
                ErrorContext::new("write_plan")
                    .with_entity("plan")
                    .with_entity_id(plan.id),
            )
        })
    }

    async fn write_fields(&self, path: &Path, fields: &[Field]) -> RepositoryResult<()> {
        if fields.is_empty() {
            return remove_if_exists(path).await;
        }
        tokio::fs::write(path, write_fields_str(fields))
            .await
            .map_err(|e| RepositoryError::from(e).with_operation("write_fields"))
    }

    async fn close(&self, mut stored: StoredPlan, status: PlanStatus) -> RepositoryResult<()> {
        remove_if_exists(&stored.fields_path()).await?;
        stored.plan.status = status;
        self.write_document(&stored.json_path, &stored.plan).await
    }
}

async fn remove_if_exists(path: &Path) -> RepositoryResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepositoryError::from(e).with_operation("remove_fields")),
    }
}

#[async_trait]
impl PlanRepository for FileSystemRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.ensure_root("health_check").await?;
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| RepositoryError::from(e).with_operation("health_check"))?;
        Ok(metadata.is_dir() && !metadata.permissions().readonly())
    }

    async fn store_plan(&self, plan: &ObservingPlan) -> RepositoryResult<PlanSummary> {
        self.ensure_root("store_plan").await?;
        let json_path = self.json_path(&plan.name);
        self.write_document(&json_path, plan).await?;
        self.write_fields(&json_path.with_extension(FIELDS_EXTENSION), &plan.fields)
            .await?;
        info!(
            "{} fields to be observed stored to {}",
            plan.fields.len(),
            json_path.with_extension(FIELDS_EXTENSION).display()
        );
        Ok(PlanSummary::from(plan))
    }

    async fn get_plan(&self, plan_id: PlanId) -> RepositoryResult<ObservingPlan> {
        let stored = self.find("get_plan", plan_id).await?;
        self.with_remaining(stored).await
    }

    async fn has_plan(&self, name: &str) -> RepositoryResult<bool> {
        tokio::fs::try_exists(self.json_path(name))
            .await
            .map_err(|e| RepositoryError::from(e).with_operation("has_plan"))
    }

    async fn list_plans(&self) -> RepositoryResult<Vec<PlanSummary>> {
        let mut summaries = Vec::new();
        for stored in self.load_all("list_plans").await? {
            let plan = self.with_remaining(stored).await?;
            summaries.push(PlanSummary::from(&plan));
        }
        Ok(summaries)
    }

    async fn list_pending_plans(&self) -> RepositoryResult<Vec<ObservingPlan>> {
        let mut plans = Vec::new();
        for stored in self.load_all("list_pending_plans").await? {
            if stored.plan.status.is_open() {
                plans.push(self.with_remaining(stored).await?);
            }
        }
        Ok(plans)
    }

    async fn update_fields(&self, plan_id: PlanId, fields: &[Field]) -> RepositoryResult<PlanStatus> {
        let stored = self.find("update_fields", plan_id).await?;
        if fields.is_empty() {
            info!("All fields of plan {} observed, closing it", stored.plan.name);
            self.close(stored, PlanStatus::Completed).await?;
            return Ok(PlanStatus::Completed);
        }
        self.write_fields(&stored.fields_path(), fields).await?;
        debug!("{} fields left for plan {}", fields.len(), stored.plan.name);
        Ok(stored.plan.status)
    }

    async fn set_status(&self, plan_id: PlanId, status: PlanStatus) -> RepositoryResult<()> {
        let mut stored = self.find("set_status", plan_id).await?;
        stored.plan.status = status;
        self.write_document(&stored.json_path, &stored.plan).await
    }

    async fn mark_expired(&self, plan_ids: &[PlanId]) -> RepositoryResult<usize> {
        let mut changed = 0;
        for stored in self.load_all("mark_expired").await? {
            if plan_ids.contains(&stored.plan.id) && stored.plan.status.is_open() {
                info!("Plan {} can no longer be observed, expiring it", stored.plan.name);
                self.close(stored, PlanStatus::Expired).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn retire_superseded(&self, dateobs: &str, keep_name: &str) -> RepositoryResult<usize> {
        let mut retired = 0;
        for stored in self.load_all("retire_superseded").await? {
            let plan = &stored.plan;
            if plan.dateobs == dateobs && plan.name != keep_name && plan.status.is_open() {
                info!(
                    "Removing older fields for the same event in {}",
                    stored.fields_path().display()
                );
                self.close(stored, PlanStatus::Expired).await?;
                retired += 1;
            }
        }
        Ok(retired)
    }
}
