use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{MagicLinkToken, NewResponse, NewSurvey, Profile, Survey, SurveyResponse, SurveyUpdate};
use super::store::{MagicLinkStore, ProfileStore, ResponseStore, StoreHealth, SurveyStore};

#[derive(Default)]
struct Tables {
    magic_links: HashMap<String, MagicLinkToken>,
    surveys: HashMap<Uuid, Survey>,
    responses: HashMap<Uuid, SurveyResponse>,
    profiles: HashMap<Uuid, Profile>,
}

/// Process-local store for development and tests.
///
/// All tables sit behind one lock, so every conditional write is atomic
/// with respect to every other operation on the store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MagicLinkStore for MemoryStore {
    async fn insert_magic_link(&self, token: &MagicLinkToken) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.surveys.contains_key(&token.survey_id) {
            return Err(DatabaseError::QueryError("magic_links.survey_id references a missing survey".into()));
        }
        if tables.magic_links.contains_key(&token.token) {
            return Err(DatabaseError::QueryError("duplicate magic link token".into()));
        }
        tables.magic_links.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_magic_link(&self, token: &str) -> Result<Option<MagicLinkToken>, DatabaseError> {
        Ok(self.tables.read().await.magic_links.get(token).cloned())
    }

    async fn consume_magic_link(&self, token: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>, DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.magic_links.get_mut(token) {
            Some(row) if row.is_valid_at(now) => {
                row.used_at = Some(now);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(link) = &survey.unique_link {
            if tables.surveys.values().any(|s| s.unique_link.as_ref() == Some(link)) {
                return Err(DatabaseError::QueryError("duplicate survey unique_link".into()));
            }
        }
        let row = Survey {
            id: Uuid::new_v4(),
            owner_account_id: survey.owner_account_id,
            title: survey.title,
            status: survey.status,
            unique_link: survey.unique_link,
            current_responses: 0,
            max_responses: survey.max_responses,
            created_at: Utc::now(),
        };
        tables.surveys.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_survey(&self, id: Uuid) -> Result<Option<Survey>, DatabaseError> {
        Ok(self.tables.read().await.surveys.get(&id).cloned())
    }

    async fn list_surveys(&self, owner: Option<Uuid>) -> Result<Vec<Survey>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Survey> = tables
            .surveys
            .values()
            .filter(|s| owner.map_or(true, |o| s.owner_account_id == o))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_survey(&self, id: Uuid, update: &SurveyUpdate) -> Result<Option<Survey>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.surveys.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        if let Some(max) = update.max_responses {
            row.max_responses = Some(max);
        }
        if row.unique_link.is_none() {
            row.unique_link = update.unique_link.clone();
        }
        Ok(Some(row.clone()))
    }

    async fn delete_survey(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.surveys.remove(&id).is_none() {
            return Ok(false);
        }
        tables.responses.retain(|_, r| r.survey_id != id);
        tables.magic_links.retain(|_, t| t.survey_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn insert_response(&self, response: NewResponse) -> Result<Option<SurveyResponse>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(survey) = tables.surveys.get_mut(&response.survey_id) else {
            return Ok(None);
        };
        if !survey.accepts_respondents() || survey.is_full() {
            return Ok(None);
        }
        survey.current_responses += 1;

        let row = SurveyResponse {
            id: Uuid::new_v4(),
            survey_id: response.survey_id,
            respondent_id: response.respondent_id,
            payload: response.payload,
            created_at: Utc::now(),
        };
        tables.responses.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn find_response(&self, id: Uuid) -> Result<Option<SurveyResponse>, DatabaseError> {
        Ok(self.tables.read().await.responses.get(&id).cloned())
    }

    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<SurveyResponse> = tables
            .responses
            .values()
            .filter(|r| r.survey_id == survey_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn delete_response(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(removed) = tables.responses.remove(&id) else {
            return Ok(false);
        };
        if let Some(survey) = tables.surveys.get_mut(&removed.survey_id) {
            survey.current_responses = (survey.current_responses - 1).max(0);
        }
        Ok(true)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        self.tables.write().await.profiles.insert(profile.id, profile.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
