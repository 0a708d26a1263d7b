//! # fram-bridge
//!
//! Bridge between SkyPortal observation plans and an RTS2-controlled FRAM
//! telescope.
//!
//! Plans requested by the GRANDMA collaboration are fetched from SkyPortal,
//! stored locally, and executed one pass at a time on the telescope. The
//! visibility filter decides which fields can be observed at a given instant
//! and in which order.
//!
//! ## Architecture
//!
//! - [`api`]: domain types (fields, plans, visibility results)
//! - [`config`]: TOML configuration with environment overrides
//! - [`clients`]: SkyPortal and RTS2 clients
//! - [`db`]: plan store (filesystem or in-memory)
//! - [`parsing`]: `.fields` tables, text tile lists, FITS headers
//! - [`services`]: visibility filter, listener, observer pass, export
//! - [`http`]: read-only status API (feature `http-server`)

// RepositoryError carries a structured context
#![allow(clippy::result_large_err)]

pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod parsing;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{BridgeError, BridgeResult};
