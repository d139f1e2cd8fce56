use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{MagicLinkToken, NewResponse, NewSurvey, Profile, Survey, SurveyResponse, SurveyUpdate};
use super::store::{MagicLinkStore, ProfileStore, ResponseStore, StoreHealth, SurveyStore};

const SURVEY_COLUMNS: &str =
    "id, owner_account_id, title, status, unique_link, current_responses, max_responses, created_at";

/// `surveys` row as stored; status is TEXT with a CHECK constraint
#[derive(Debug, FromRow)]
struct SurveyRow {
    id: Uuid,
    owner_account_id: Uuid,
    title: String,
    status: String,
    unique_link: Option<String>,
    current_responses: i32,
    max_responses: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SurveyRow> for Survey {
    type Error = DatabaseError;

    fn try_from(row: SurveyRow) -> Result<Self, Self::Error> {
        Ok(Survey {
            id: row.id,
            owner_account_id: row.owner_account_id,
            title: row.title,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            unique_link: row.unique_link,
            current_responses: row.current_responses,
            max_responses: row.max_responses,
            created_at: row.created_at,
        })
    }
}

/// sqlx-backed store. Connects with a role that bypasses RLS; the
/// application-level policy is the gate.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MagicLinkStore for PgStore {
    async fn insert_magic_link(&self, token: &MagicLinkToken) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO magic_links (token, email, survey_id, expires_at, used_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&token.token)
        .bind(&token.email)
        .bind(token.survey_id)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_magic_link(&self, token: &str) -> Result<Option<MagicLinkToken>, DatabaseError> {
        let row = sqlx::query_as::<_, MagicLinkToken>(
            "SELECT token, email, survey_id, expires_at, used_at, created_at
             FROM magic_links
             WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn consume_magic_link(&self, token: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>, DatabaseError> {
        // Predicate and write in one statement; concurrent callers serialize on the row lock
        let row = sqlx::query_as::<_, MagicLinkToken>(
            "UPDATE magic_links
             SET used_at = $2
             WHERE token = $1
               AND used_at IS NULL
               AND expires_at > $2
             RETURNING token, email, survey_id, expires_at, used_at, created_at",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn insert_survey(&self, survey: NewSurvey) -> Result<Survey, DatabaseError> {
        let query = format!(
            "INSERT INTO surveys (id, owner_account_id, title, status, unique_link, max_responses)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            SURVEY_COLUMNS
        );
        let row = sqlx::query_as::<_, SurveyRow>(&query)
            .bind(Uuid::new_v4())
            .bind(survey.owner_account_id)
            .bind(&survey.title)
            .bind(survey.status.as_str())
            .bind(&survey.unique_link)
            .bind(survey.max_responses)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find_survey(&self, id: Uuid) -> Result<Option<Survey>, DatabaseError> {
        let query = format!("SELECT {} FROM surveys WHERE id = $1", SURVEY_COLUMNS);
        sqlx::query_as::<_, SurveyRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Survey::try_from)
            .transpose()
    }

    async fn list_surveys(&self, owner: Option<Uuid>) -> Result<Vec<Survey>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM surveys
             WHERE ($1::uuid IS NULL OR owner_account_id = $1)
             ORDER BY created_at DESC",
            SURVEY_COLUMNS
        );
        sqlx::query_as::<_, SurveyRow>(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Survey::try_from)
            .collect()
    }

    async fn update_survey(&self, id: Uuid, update: &SurveyUpdate) -> Result<Option<Survey>, DatabaseError> {
        let query = format!(
            "UPDATE surveys SET
                title = COALESCE($2, title),
                status = COALESCE($3, status),
                max_responses = COALESCE($4, max_responses),
                unique_link = COALESCE(unique_link, $5)
             WHERE id = $1
             RETURNING {}",
            SURVEY_COLUMNS
        );
        sqlx::query_as::<_, SurveyRow>(&query)
            .bind(id)
            .bind(&update.title)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.max_responses)
            .bind(&update.unique_link)
            .fetch_optional(&self.pool)
            .await?
            .map(Survey::try_from)
            .transpose()
    }

    async fn delete_survey(&self, id: Uuid) -> Result<bool, DatabaseError> {
        // responses and magic_links cascade via their foreign keys
        let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ResponseStore for PgStore {
    async fn insert_response(&self, response: NewResponse) -> Result<Option<SurveyResponse>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE surveys
             SET current_responses = current_responses + 1
             WHERE id = $1
               AND status = 'active'
               AND unique_link IS NOT NULL
               AND (max_responses IS NULL OR current_responses < max_responses)",
        )
        .bind(response.survey_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, SurveyResponse>(
            "INSERT INTO responses (id, survey_id, respondent_id, payload)
             VALUES ($1, $2, $3, $4)
             RETURNING id, survey_id, respondent_id, payload, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(response.survey_id)
        .bind(&response.respondent_id)
        .bind(&response.payload)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn find_response(&self, id: Uuid) -> Result<Option<SurveyResponse>, DatabaseError> {
        let row = sqlx::query_as::<_, SurveyResponse>(
            "SELECT id, survey_id, respondent_id, payload, created_at FROM responses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>, DatabaseError> {
        let rows = sqlx::query_as::<_, SurveyResponse>(
            "SELECT id, survey_id, respondent_id, payload, created_at
             FROM responses
             WHERE survey_id = $1
             ORDER BY created_at ASC",
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_response(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(Uuid,)> = sqlx::query_as("DELETE FROM responses WHERE id = $1 RETURNING survey_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((survey_id,)) = deleted else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("UPDATE surveys SET current_responses = GREATEST(current_responses - 1, 0) WHERE id = $1")
            .bind(survey_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        let row = sqlx::query_as::<_, Profile>("SELECT id, plan_name, subscription_status FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO profiles (id, plan_name, subscription_status)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE
             SET plan_name = EXCLUDED.plan_name,
                 subscription_status = EXCLUDED.subscription_status",
        )
        .bind(profile.id)
        .bind(&profile.plan_name)
        .bind(&profile.subscription_status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
