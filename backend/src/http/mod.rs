//! Read-only HTTP status API.
//!
//! Exposes the plan store and the visibility filter so operators can see what
//! the bridge holds and what it would observe right now.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                              │
//! │  - Path/query parsing                                    │
//! │  - JSON serialization                                    │
//! │  - CORS, compression, tracing, error mapping             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  VisibilityFilter (services::visibility)                 │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  PlanRepository (db/)                                    │
//! │  - FileSystemRepository / LocalRepository                │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
