//! Service layer: the visibility filter and the workflows built on it.
//!
//! - [`coordinates`]: sidereal time and equatorial to horizontal conversion
//! - [`visibility`]: observability, ranking and plan expiry
//! - [`horizon`]: local horizon profile of the site
//! - [`report`]: night visibility of plan fields
//! - [`listener`]: SkyPortal polling and plan ingestion
//! - [`observer`]: one observation pass on the telescope
//! - [`export`]: renaming and annotating acquired frames

pub mod coordinates;
pub mod export;
pub mod horizon;
pub mod listener;
pub mod observer;
pub mod report;
pub mod visibility;

pub use horizon::HorizonProfile;
pub use listener::{Listener, ListenerOptions, PollOutcome};
pub use observer::{observe_pass, ObserveOptions, PassOutcome};
pub use report::{plan_report, NightVisibility, NightWindow, PlanReport};
pub use visibility::{VisibilityFilter, DEFAULT_MIN_ALTITUDE};
