use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account profile. The id doubles as the account id that owns surveys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub plan_name: String,
    pub subscription_status: String,
}
