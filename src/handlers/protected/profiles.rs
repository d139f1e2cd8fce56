// handlers/protected/profiles.rs - GET /api/profiles/:id

use axum::{
    extract::{Path, State},
    Extension,
};

use super::super::parse_id;
use crate::app::AppState;
use crate::database::models::Profile;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Principal;

pub async fn profile_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Profile> {
    let profile = state.profiles.get(&principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(profile))
}
