use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Active,
    Closed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Active => "active",
            SurveyStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SurveyStatus::Draft),
            "active" => Ok(SurveyStatus::Active),
            "closed" => Ok(SurveyStatus::Closed),
            other => Err(format!("unknown survey status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub owner_account_id: Uuid,
    pub title: String,
    pub status: SurveyStatus,
    pub unique_link: Option<String>,
    pub current_responses: i32,
    pub max_responses: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    /// Active with a published link: the only state that takes tokens or anonymous responses
    pub fn accepts_respondents(&self) -> bool {
        self.status == SurveyStatus::Active && self.unique_link.is_some()
    }

    pub fn is_full(&self) -> bool {
        matches!(self.max_responses, Some(max) if self.current_responses >= max)
    }
}

#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub owner_account_id: Uuid,
    pub title: String,
    pub status: SurveyStatus,
    pub unique_link: Option<String>,
    pub max_responses: Option<i32>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyUpdate {
    pub title: Option<String>,
    pub status: Option<SurveyStatus>,
    pub max_responses: Option<i32>,
    #[serde(skip)]
    pub unique_link: Option<String>,
}

impl SurveyUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none() && self.max_responses.is_none() && self.unique_link.is_none()
    }
}
