use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::docs::ApiDoc;
use crate::state::AppState;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes())
        .nest("/api/v1/queues", crate::modules::queue::router(state.clone()))
        .nest("/api/v1/storage", crate::modules::storage::router(state))
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub redis: String,
    pub queues: Vec<String>,
}

/// Liveness plus a Redis round trip
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthResponse>),
        (status = 503, description = "Redis unreachable")
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = state.redis.ping().await {
        warn!("Health check failed: {}", e);
        return Err(ApiError(
            "Redis unavailable".to_string(),
            StatusCode::SERVICE_UNAVAILABLE,
        ));
    }

    let health = HealthResponse {
        redis: "up".to_string(),
        queues: state.workers.started_queues(),
    };
    Ok(ApiSuccess(ApiResponse::success(health, "OK"), StatusCode::OK))
}
