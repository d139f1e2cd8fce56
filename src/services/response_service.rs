use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::{missing, require};
use crate::database::models::{NewResponse, Survey, SurveyResponse};
use crate::database::{ResponseStore, Store, SurveyStore};
use crate::policy::{Operation, Principal, Resource};

/// Body of a response submission
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub respondent_id: Option<String>,
    pub payload: serde_json::Value,
}

pub struct ResponseService {
    store: Arc<dyn Store>,
}

impl ResponseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert a response. The survey's counter moves with the row, and the
    /// insert is refused once `max_responses` is reached.
    pub async fn submit(&self, principal: &Principal, survey_id: Uuid, submission: Submission) -> ServiceResult<SurveyResponse> {
        if !submission.payload.is_object() {
            return Err(ServiceError::InvalidInput("payload must be a JSON object".into()));
        }

        let survey = self.survey(principal, survey_id).await?;
        require(principal, &Resource::response_of(&survey), Operation::Insert)?;
        if survey.is_full() {
            return Err(ServiceError::ResponseLimitReached);
        }

        let respondent_id = match (principal, submission.respondent_id) {
            // A magic link session answers under its own address
            (Principal::Respondent { email, .. }, _) => email.clone(),
            (_, Some(id)) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        let inserted = self
            .store
            .insert_response(NewResponse {
                survey_id,
                respondent_id,
                payload: submission.payload,
            })
            .await?;

        // Only a concurrent submit or status change gets here
        let Some(response) = inserted else {
            tracing::warn!(%survey_id, "response refused at insert time");
            return Err(ServiceError::ResponseLimitReached);
        };

        tracing::info!(%survey_id, response_id = %response.id, "response submitted");
        Ok(response)
    }

    pub async fn list(&self, principal: &Principal, survey_id: Uuid) -> ServiceResult<Vec<SurveyResponse>> {
        let survey = self.survey(principal, survey_id).await?;
        require(principal, &Resource::response_of(&survey), Operation::Read)?;
        Ok(self.store.list_responses(survey_id).await?)
    }

    pub async fn delete(&self, principal: &Principal, response_id: Uuid) -> ServiceResult<()> {
        let response = self
            .store
            .find_response(response_id)
            .await?
            .ok_or_else(|| missing(principal, "response"))?;
        let survey = self.survey(principal, response.survey_id).await?;
        require(principal, &Resource::response_of(&survey), Operation::Delete)?;

        if !self.store.delete_response(response_id).await? {
            return Err(missing(principal, "response"));
        }
        tracing::info!(%response_id, survey_id = %survey.id, "response deleted");
        Ok(())
    }

    async fn survey(&self, principal: &Principal, id: Uuid) -> ServiceResult<Survey> {
        self.store
            .find_survey(id)
            .await?
            .ok_or_else(|| missing(principal, "survey"))
    }
}
