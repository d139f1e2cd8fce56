use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::token::generate_link_slug;
use super::{missing, require};
use crate::database::models::{Survey, SurveyStatus, SurveyUpdate};
use crate::database::{Store, SurveyStore};
use crate::policy::{Operation, Principal, Resource};

pub struct SurveyService {
    store: Arc<dyn Store>,
}

impl SurveyService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> ServiceResult<Survey> {
        let survey = self.load(principal, id).await?;
        require(principal, &Resource::survey(&survey), Operation::Read)?;
        Ok(survey)
    }

    /// Every survey the principal may read. Owners see their own, service sees all.
    pub async fn list(&self, principal: &Principal) -> ServiceResult<Vec<Survey>> {
        let owner = match principal {
            Principal::Service => None,
            Principal::Account { account_id } => Some(*account_id),
            _ => return Err(ServiceError::Unauthorized),
        };

        let surveys = self.store.list_surveys(owner).await?;
        Ok(surveys
            .into_iter()
            .filter(|s| crate::policy::authorize(principal, &Resource::survey(s), Operation::Read).is_allowed())
            .collect())
    }

    pub async fn update(&self, principal: &Principal, id: Uuid, mut update: SurveyUpdate) -> ServiceResult<Survey> {
        validate_update(&update)?;

        let survey = self.load(principal, id).await?;
        require(principal, &Resource::survey(&survey), Operation::Update)?;

        if update.is_empty() {
            return Ok(survey);
        }

        // Going live needs a public link to hand out
        if update.status == Some(SurveyStatus::Active) && survey.unique_link.is_none() {
            update.unique_link = Some(generate_link_slug());
        }

        let updated = self
            .store
            .update_survey(id, &update)
            .await?
            .ok_or_else(|| missing(principal, "survey"))?;

        tracing::info!(survey_id = %id, status = %updated.status, "survey updated");
        Ok(updated)
    }

    /// Removes the survey, its responses, and any outstanding magic links
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        let survey = self.load(principal, id).await?;
        require(principal, &Resource::survey(&survey), Operation::Delete)?;

        if !self.store.delete_survey(id).await? {
            return Err(missing(principal, "survey"));
        }
        tracing::info!(survey_id = %id, "survey deleted");
        Ok(())
    }

    async fn load(&self, principal: &Principal, id: Uuid) -> ServiceResult<Survey> {
        self.store
            .find_survey(id)
            .await?
            .ok_or_else(|| missing(principal, "survey"))
    }
}

fn validate_update(update: &SurveyUpdate) -> ServiceResult<()> {
    if let Some(title) = &update.title {
        if title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title must not be empty".into()));
        }
    }
    if let Some(max) = update.max_responses {
        if max <= 0 {
            return Err(ServiceError::InvalidInput("max_responses must be positive".into()));
        }
    }
    Ok(())
}
