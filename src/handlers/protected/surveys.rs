// handlers/protected/surveys.rs - /api/surveys and /api/surveys/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use super::super::parse_id;
use crate::app::AppState;
use crate::database::models::{Survey, SurveyUpdate};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Principal;

/// GET /api/surveys - surveys owned by the caller (all of them for service)
pub async fn surveys_get(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Vec<Survey>> {
    let surveys = state.surveys.list(&principal).await?;
    Ok(ApiResponse::success(surveys))
}

/// GET /api/surveys/:id
pub async fn survey_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Survey> {
    let survey = state.surveys.get(&principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(survey))
}

/// PATCH /api/surveys/:id - title, status, max_responses
pub async fn survey_patch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<SurveyUpdate>, JsonRejection>,
) -> ApiResult<Survey> {
    let id = parse_id(&id)?;
    let Json(update) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let survey = state.surveys.update(&principal, id, update).await?;
    Ok(ApiResponse::success(survey))
}

/// DELETE /api/surveys/:id
pub async fn survey_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    state.surveys.delete(&principal, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
