// handlers/public/magic_link.rs - POST /auth/magic-link/{generate,validate,use}

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ConsumedToken, TokenPreview};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub email: String,
    pub survey_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub email: String,
    pub survey_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Only present when `magic_link.expose_token` is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// POST /auth/magic-link/generate
///
/// Mints a token and emails the link. The email goes out in the background;
/// the response does not wait for it.
///
/// ```json
/// { "email": "alice@example.com", "survey_id": "..." }
/// ```
pub async fn generate_post(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<GenerateResponse> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let issuance = state.issuer.issue(&req.email, req.survey_id).await?;
    // Dropping the handle detaches delivery
    drop(issuance.delivery);

    let issued = issuance.token;
    Ok(ApiResponse::success(GenerateResponse {
        email: issued.email,
        survey_id: issued.survey_id,
        expires_at: issued.expires_at,
        token: state.config.magic_link.expose_token.then_some(issued.token),
    }))
}

/// POST /auth/magic-link/validate - read-only preview of a link
pub async fn validate_post(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<TokenPreview> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let preview = state.validator.validate(req.token.trim()).await?;
    Ok(ApiResponse::success(preview))
}

/// POST /auth/magic-link/use - spend the token for a survey-scoped session
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "session": { "access_token": "eyJ...", "token_type": "bearer", "expires_at": "...", ... },
///     "survey_id": "..."
///   }
/// }
/// ```
pub async fn use_post(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<ConsumedToken> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let consumed = state.consumer.consume(req.token.trim()).await?;
    Ok(ApiResponse::success(consumed))
}
