use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod service;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/objects",
            get(handler::list_objects).delete(handler::delete_objects),
        )
        .route("/objects/{*key}", get(handler::get_object))
        .route("/presign", get(handler::presign_object))
        .route_layer(middleware::from_fn(crate::middleware::role::admin_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
