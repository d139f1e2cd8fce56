use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{MagicLinkToken, NewResponse, NewSurvey, Profile, Survey, SurveyResponse, SurveyUpdate};

#[async_trait]
pub trait MagicLinkStore: Send + Sync {
    async fn insert_magic_link(&self, token: &MagicLinkToken) -> Result<(), DatabaseError>;

    async fn find_magic_link(&self, token: &str) -> Result<Option<MagicLinkToken>, DatabaseError>;

    /// Test-and-set on `used_at`: stamps `now` only if the token is unused and
    /// unexpired at `now`, as one indivisible step. Returns the consumed row,
    /// or `None` when nothing matched.
    async fn consume_magic_link(&self, token: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>, DatabaseError>;
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, DatabaseError>;

    async fn find_survey(&self, id: Uuid) -> Result<Option<Survey>, DatabaseError>;

    /// All surveys, or only those owned by `owner`
    async fn list_surveys(&self, owner: Option<Uuid>) -> Result<Vec<Survey>, DatabaseError>;

    async fn update_survey(&self, id: Uuid, update: &SurveyUpdate) -> Result<Option<Survey>, DatabaseError>;

    /// Removes the survey together with its responses and magic links
    async fn delete_survey(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Inserts and bumps `current_responses` only while the survey is active,
    /// linked, and under `max_responses`. `None` means the survey refused it.
    async fn insert_response(&self, response: NewResponse) -> Result<Option<SurveyResponse>, DatabaseError>;

    async fn find_response(&self, id: Uuid) -> Result<Option<SurveyResponse>, DatabaseError>;

    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, DatabaseError>;

    async fn delete_response(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, DatabaseError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// Everything the services need from one backend
pub trait Store: MagicLinkStore + SurveyStore + ResponseStore + ProfileStore + StoreHealth {}

impl<T> Store for T where T: MagicLinkStore + SurveyStore + ResponseStore + ProfileStore + StoreHealth {}
