//! Clients for the two remote systems the bridge talks to.
//!
//! - [`skyportal`]: source of observation plans ([`PlanSource`])
//! - [`rts2`]: the telescope controller ([`TelescopeExecutor`])

pub mod error;
pub mod rts2;
pub mod skyportal;

pub use error::ClientError;
pub use rts2::{DryRunExecutor, ExecutorCommand, Rts2Client, SiteState, TelescopeExecutor};
pub use skyportal::{event_name_from_response, PlanSource, SkyPortalClient};
