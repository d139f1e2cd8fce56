use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::token::{fingerprint, looks_like_token};
use crate::clock::Clock;
use crate::database::{MagicLinkStore, Store, SurveyStore};

/// What a link preview may show before the token is spent
#[derive(Debug, Clone, Serialize)]
pub struct TokenPreview {
    pub email: String,
    pub survey_id: Uuid,
    pub survey_title: String,
}

pub struct TokenValidator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Read-only check. Never writes `used_at`.
    pub async fn validate(&self, token: &str) -> ServiceResult<TokenPreview> {
        if !looks_like_token(token) {
            return Err(ServiceError::TokenInvalid);
        }

        let now = self.clock.now();
        let row = match self.store.find_magic_link(token).await? {
            Some(row) if row.is_valid_at(now) => row,
            _ => {
                tracing::info!(fingerprint = %fingerprint(token), "magic link validation refused");
                return Err(ServiceError::TokenInvalid);
            }
        };

        // The survey may have been deleted since issuance
        let Some(survey) = self.store.find_survey(row.survey_id).await? else {
            return Err(ServiceError::TokenInvalid);
        };

        Ok(TokenPreview {
            email: row.email,
            survey_id: row.survey_id,
            survey_title: survey.title,
        })
    }
}
