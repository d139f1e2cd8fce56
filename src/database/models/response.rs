use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub respondent_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub survey_id: Uuid,
    pub respondent_id: String,
    pub payload: serde_json::Value,
}
