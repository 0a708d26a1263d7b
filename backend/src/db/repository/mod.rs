//! Repository trait definitions for the plan store.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`plan`]: Plan storage and lifecycle operations

pub mod error;
pub mod plan;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use plan::PlanRepository;
