use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::common::response::ApiError;
use crate::state::AppState;

/// Claims of the access tokens issued by the platform's auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn blocked_token_key(token: &str) -> String {
    format!("blocked_token:{}", token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::to_owned)
        .ok_or_else(|| {
            ApiError(
                "Unauthorized: Missing or invalid token".to_string(),
                StatusCode::UNAUTHORIZED,
            )
        })?;

    let claims = decode::<OperatorClaims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| {
        ApiError(
            "Unauthorized: Invalid token signature".to_string(),
            StatusCode::UNAUTHORIZED,
        )
    })?
    .claims;

    // Revocations are written by the auth service on logout
    let mut redis = state.redis.get_conn().await.map_err(|_| {
        ApiError(
            "Internal Server Error: Redis unavailable".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    let is_blocked: bool = redis.exists(blocked_token_key(&token)).await.map_err(|_| {
        ApiError(
            "Internal Server Error: Redis error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    if is_blocked {
        return Err(ApiError(
            "Unauthorized: Token is blocked/revoked".to_string(),
            StatusCode::UNAUTHORIZED,
        ));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
