//! Application state for the HTTP server.

use qtty::Degrees;
use std::sync::Arc;

use crate::api::ObserverLocation;
use crate::db::repository::PlanRepository;
use crate::error::BridgeResult;
use crate::services::visibility::VisibilityFilter;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Plan store
    pub repository: Arc<dyn PlanRepository>,
    /// Site used for visibility; unknown when neither configured nor reported by RTS2
    pub location: Option<ObserverLocation>,
    pub min_altitude: Degrees,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn PlanRepository>,
        location: Option<ObserverLocation>,
        min_altitude: Degrees,
    ) -> Self {
        Self {
            repository,
            location,
            min_altitude,
        }
    }

    /// Visibility filter for the configured site.
    pub fn filter(&self) -> BridgeResult<VisibilityFilter> {
        VisibilityFilter::new(self.location, self.min_altitude)
    }
}
