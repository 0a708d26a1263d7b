//! Plan store.
//!
//! Plans fetched from SkyPortal are persisted through the [`PlanRepository`]
//! trait so the listener, the observer pass and the HTTP layer all see the
//! same state:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  listener / observer / HTTP handlers                 │
//! └───────────────────┬──────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────┐
//! │  PlanRepository trait (repository/plan.rs)           │
//! └───────────────────┬──────────────────────────────────┘
//!                     │
//!     ┌───────────────┴───────────────┐
//!     │ FileSystemRepository          │ LocalRepository
//!     │ (<name>.json + <name>.fields) │ (in-memory)
//!     └───────────────────────────────┘
//! ```

pub mod checksum;
pub mod factory;
pub mod repositories;
pub mod repository;

pub use checksum::calculate_checksum;
pub use factory::{RepositoryFactory, RepositoryType};
pub use repositories::{FileSystemRepository, LocalRepository};
pub use repository::{ErrorContext, PlanRepository, RepositoryError, RepositoryResult};
