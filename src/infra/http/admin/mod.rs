mod actor;
mod cache;
mod health;
mod models;
mod rollouts;
mod state;
mod toggles;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    let api = Router::new()
        .route(
            "/api/toggles",
            get(toggles::list_toggles).post(toggles::create_toggle),
        )
        .route(
            "/api/toggles/{id}",
            get(toggles::get_toggle)
                .put(toggles::update_toggle)
                .patch(toggles::set_toggle_active)
                .delete(toggles::delete_toggle),
        )
        .route(
            "/api/toggles/{id}/rollouts",
            get(rollouts::list_toggle_rollouts),
        )
        .route("/api/rollouts", post(rollouts::create_rollout))
        .route(
            "/api/rollouts/{id}",
            get(rollouts::get_rollout)
                .put(rollouts::update_rollout)
                .delete(rollouts::delete_rollout),
        )
        .route(
            "/api/rollouts/{id}/percentage",
            patch(rollouts::set_rollout_percentage),
        )
        .route("/api/rollouts/{id}/impact", get(rollouts::rollout_impact))
        .route("/api/cache/purge", post(cache::purge_cache))
        .route_layer(middleware::from_fn(actor::require_actor));

    Router::new()
        .merge(api)
        .route("/_health/db", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
