use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod service;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_queues))
        .route("/{name}", get(handler::get_queue))
        .route("/{name}/jobs", post(handler::enqueue_job))
        .route("/{name}/pop", post(handler::pop_job))
        .route_layer(middleware::from_fn(crate::middleware::role::admin_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
