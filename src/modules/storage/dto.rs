use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PRESIGN_SECS: u64 = 3600;
/// SigV4 presigned URLs are capped at seven days.
pub const MAX_PRESIGN_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListObjectsQuery {
    /// Key prefix; the whole bucket when omitted
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeletePrefixQuery {
    pub prefix: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PresignQuery {
    pub key: String,
    /// Seconds, default 3600
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObjectListResponse {
    pub prefix: String,
    pub count: usize,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletePrefixResponse {
    pub prefix: String,
    pub deleted: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub key: String,
    pub url: String,
    pub expires_in: u64,
}
