// handlers/protected/responses.rs - /api/surveys/:id/responses and /api/responses/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use super::super::parse_id;
use crate::app::AppState;
use crate::database::models::SurveyResponse;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Principal;
use crate::services::Submission;

/// GET /api/surveys/:id/responses - survey owner only
pub async fn responses_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<String>,
) -> ApiResult<Vec<SurveyResponse>> {
    let responses = state.responses.list(&principal, parse_id(&survey_id)?).await?;
    Ok(ApiResponse::success(responses))
}

/// POST /api/surveys/:id/responses
///
/// Open to anonymous callers while the survey is active and linked.
///
/// ```json
/// { "respondent_id": "optional", "payload": { "q1": 4 } }
/// ```
pub async fn responses_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<String>,
    body: Result<Json<Submission>, JsonRejection>,
) -> ApiResult<SurveyResponse> {
    let survey_id = parse_id(&survey_id)?;
    let Json(submission) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let response = state.responses.submit(&principal, survey_id, submission).await?;
    Ok(ApiResponse::created(response))
}

/// DELETE /api/responses/:id
pub async fn response_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    state.responses.delete(&principal, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
