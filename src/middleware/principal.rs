use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::policy::Principal;

/// Resolves the bearer token (if any) into a `Principal` request extension.
///
/// No Authorization header means `Principal::Anonymous`. A header that is
/// present but malformed, forged, or expired is a 401, never a downgrade.
pub async fn principal_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let principal = match bearer_token(request.headers()) {
        Ok(None) => Principal::Anonymous,
        Ok(Some(token)) => match state.sessions.decode(token) {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!("Rejected bearer token: {}", e);
                return ApiError::unauthorized("Invalid or expired bearer token").into_response();
            }
        },
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| "Invalid Authorization header format")?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or("Authorization header must use Bearer token format")?
        .trim();

    if token.is_empty() {
        return Err("Empty bearer token");
    }
    Ok(Some(token))
}
