use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use super::dto::{EnqueueJobRequest, EnqueueResponse, JobResponse, QueueDepthResponse, QueueSummary};
use super::service::QueueOpsService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;

/// List registered queues with their depth and worker count
#[utoipa::path(
    get,
    path = "/api/v1/queues",
    responses(
        (status = 200, description = "Registered queues", body = ApiResponse<Vec<QueueSummary>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Queues",
    security(("bearer_auth" = []))
)]
pub async fn list_queues(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let queues = QueueOpsService::list(state.queue.as_ref(), &state.workers).await?;
    Ok(ApiSuccess(
        ApiResponse::success(queues, "Queues retrieved successfully"),
        StatusCode::OK,
    ))
}

/// Current depth of one queue
#[utoipa::path(
    get,
    path = "/api/v1/queues/{name}",
    params(
        ("name" = String, Path, description = "Queue name")
    ),
    responses(
        (status = 200, description = "Queue depth", body = ApiResponse<QueueDepthResponse>),
        (status = 400, description = "Invalid queue name")
    ),
    tag = "Queues",
    security(("bearer_auth" = []))
)]
pub async fn get_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let depth = QueueOpsService::depth(state.queue.as_ref(), &name).await?;
    Ok(ApiSuccess(
        ApiResponse::success(depth, "Queue retrieved successfully"),
        StatusCode::OK,
    ))
}

/// Enqueue a media job
#[utoipa::path(
    post,
    path = "/api/v1/queues/{name}/jobs",
    params(
        ("name" = String, Path, description = "Queue name")
    ),
    request_body = EnqueueJobRequest,
    responses(
        (status = 201, description = "Job enqueued", body = ApiResponse<EnqueueResponse>),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Queues",
    security(("bearer_auth" = []))
)]
pub async fn enqueue_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<EnqueueJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let queued = QueueOpsService::enqueue(state.queue.as_ref(), &name, payload).await?;
    Ok(ApiSuccess(
        ApiResponse::success(queued, "Job enqueued successfully"),
        StatusCode::CREATED,
    ))
}

/// Take the next job off a queue without waiting
#[utoipa::path(
    post,
    path = "/api/v1/queues/{name}/pop",
    params(
        ("name" = String, Path, description = "Queue name")
    ),
    responses(
        (status = 200, description = "Next job", body = ApiResponse<JobResponse>),
        (status = 404, description = "Queue is empty")
    ),
    tag = "Queues",
    security(("bearer_auth" = []))
)]
pub async fn pop_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match QueueOpsService::pop(state.queue.as_ref(), &name).await? {
        Some(job) => Ok(ApiSuccess(
            ApiResponse::success(job, "Job popped successfully"),
            StatusCode::OK,
        )),
        None => Err(ApiError::not_found(format!("Queue '{}' is empty", name))),
    }
}
