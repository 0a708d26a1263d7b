//! Repository factory for dependency injection.
//!
//! Picks the plan store implementation from the `[storage]` configuration.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repositories::{FileSystemRepository, LocalRepository};
use super::repository::{PlanRepository, RepositoryError, RepositoryResult};
use crate::config::StorageConfig;

/// Plan store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// `.json` + `.fields` files under the storage root
    #[default]
    Filesystem,
    /// In-memory store
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("filesystem", "fs", "local").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

/// Repository factory for creating plan store instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a plan store of the given type.
    ///
    /// # Arguments
    /// * `repo_type` - Backend to create
    /// * `root` - Storage root (required for the filesystem backend)
    pub fn create(
        repo_type: RepositoryType,
        root: Option<&Path>,
    ) -> RepositoryResult<Arc<dyn PlanRepository>> {
        match repo_type {
            RepositoryType::Filesystem => {
                let root = root.ok_or_else(|| {
                    RepositoryError::configuration("Filesystem repository requires a storage root")
                })?;
                Ok(Self::create_filesystem(root))
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }

    /// Create a filesystem plan store rooted at `root`.
    pub fn create_filesystem(root: &Path) -> Arc<dyn PlanRepository> {
        Arc::new(FileSystemRepository::new(root))
    }

    /// Create an in-memory plan store.
    pub fn create_local() -> Arc<dyn PlanRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create the plan store described by the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> RepositoryResult<Arc<dyn PlanRepository>> {
        Self::create(config.backend, Some(&config.root))
    }
}
