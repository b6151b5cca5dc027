use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use super::dto::{
    DeletePrefixQuery, DeletePrefixResponse, ListObjectsQuery, ObjectListResponse, PresignQuery,
    PresignResponse,
};
use super::service::StorageOpsService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::infrastructure::storage::content_type_for;
use crate::state::AppState;

/// List object keys under a prefix
#[utoipa::path(
    get,
    path = "/api/v1/storage/objects",
    params(ListObjectsQuery),
    responses(
        (status = 200, description = "Matching keys", body = ApiResponse<ObjectListResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Storage",
    security(("bearer_auth" = []))
)]
pub async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = StorageOpsService::list(&state.storage, query.prefix).await?;
    Ok(ApiSuccess(
        ApiResponse::success(listing, "Objects retrieved successfully"),
        StatusCode::OK,
    ))
}

/// Download one object
/// Streams the body from the object store
#[utoipa::path(
    get,
    path = "/api/v1/storage/objects/{key}",
    params(
        ("key" = String, Path, description = "Object key, may contain slashes")
    ),
    responses(
        (status = 200, description = "Object bytes"),
        (status = 404, description = "Not Found")
    ),
    tag = "Storage",
    security(("bearer_auth" = []))
)]
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let key = state.storage.resolve_key(&key)?;
    let reader = state.storage.get_object_stream(&key).await?;
    let content_type = content_type_for(std::path::Path::new(&key));

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

/// Delete every object under a prefix
#[utoipa::path(
    delete,
    path = "/api/v1/storage/objects",
    params(DeletePrefixQuery),
    responses(
        (status = 200, description = "Objects deleted", body = ApiResponse<DeletePrefixResponse>),
        (status = 400, description = "Empty prefix")
    ),
    tag = "Storage",
    security(("bearer_auth" = []))
)]
pub async fn delete_objects(
    State(state): State<AppState>,
    Query(query): Query<DeletePrefixQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = StorageOpsService::delete_prefix(&state.storage, &query.prefix).await?;
    Ok(ApiSuccess(
        ApiResponse::success(deleted, "Objects deleted successfully"),
        StatusCode::OK,
    ))
}

/// Presigned GET URL for an object
#[utoipa::path(
    get,
    path = "/api/v1/storage/presign",
    params(PresignQuery),
    responses(
        (status = 200, description = "Presigned URL", body = ApiResponse<PresignResponse>),
        (status = 400, description = "Invalid key")
    ),
    tag = "Storage",
    security(("bearer_auth" = []))
)]
pub async fn presign_object(
    State(state): State<AppState>,
    Query(query): Query<PresignQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let presigned = StorageOpsService::presign(&state.storage, &query.key, query.expires_in).await?;
    Ok(ApiSuccess(
        ApiResponse::success(presigned, "URL generated successfully"),
        StatusCode::OK,
    ))
}
