use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use super::auth::OperatorClaims;
use crate::common::response::ApiError;

pub const ADMIN_ROLE: &str = "ADMIN";

pub async fn admin_guard(
    Extension(claims): Extension<OperatorClaims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if claims.role != ADMIN_ROLE {
        return Err(ApiError(
            "Forbidden: Admin access required".to_string(),
            StatusCode::FORBIDDEN,
        ));
    }

    Ok(next.run(req).await)
}
