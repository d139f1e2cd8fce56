// handlers/protected/auth.rs - GET /api/auth/whoami

use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Principal;

/// Describes the principal the bearer token resolved to
pub async fn whoami_get(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}
