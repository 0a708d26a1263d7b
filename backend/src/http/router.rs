//! Router configuration for the HTTP API.
//!
//! Sets up the routes and middleware (CORS, compression, tracing).

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Read-only API: any origin may query it
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route("/plans", get(handlers::list_plans))
        .route("/plans/{plan_id}", get(handlers::get_plan))
        .route("/plans/{plan_id}/visibility", get(handlers::get_plan_visibility))
        .route("/schedule", get(handlers::get_schedule));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::PlanRepository;
    use crate::services::visibility::DEFAULT_MIN_ALTITUDE;
    use std::sync::Arc;

    #[test]
    fn test_router_creation() {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn PlanRepository>;
        let state = AppState::new(repo, None, DEFAULT_MIN_ALTITUDE);
        let _router = create_router(state);
    }
}
