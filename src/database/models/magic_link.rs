use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row in `magic_links`. The token string is the only credential.
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct MagicLinkToken {
    pub token: String,
    pub email: String,
    pub survey_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MagicLinkToken {
    /// Valid iff never consumed and `now` is strictly before expiry
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

impl std::fmt::Debug for MagicLinkToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicLinkToken")
            .field("token", &"[REDACTED]")
            .field("email", &self.email)
            .field("survey_id", &self.survey_id)
            .field("expires_at", &self.expires_at)
            .field("used_at", &self.used_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}
