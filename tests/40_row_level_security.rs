// Row-level security against a live Postgres.
// Runs only when TEST_DATABASE_URL is set; the user must be allowed to CREATE ROLE.
// Every test works inside one transaction that is rolled back, role included.

use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use survey_auth_api::database::DatabaseManager;

async fn pool() -> Result<Option<PgPool>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping row-level security tests");
        return Ok(None);
    };
    let pool = PgPool::connect(&url).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Some(pool))
}

struct Fixture {
    owner: Uuid,
    active: Uuid,
    draft: Uuid,
}

/// Seed as the table owner, then drop to an unprivileged role
async fn begin(pool: &PgPool) -> Result<(Transaction<'static, Postgres>, Fixture)> {
    let mut tx = pool.begin().await?;
    let owner = Uuid::new_v4();
    let active = Uuid::new_v4();
    let draft = Uuid::new_v4();

    for (id, status, link) in [
        (active, "active", Some(format!("rls-{}", active.simple()))),
        (draft, "draft", None),
    ] {
        sqlx::query("INSERT INTO surveys (id, owner_account_id, title, status, unique_link) VALUES ($1, $2, 'RLS', $3, $4)")
            .bind(id)
            .bind(owner)
            .bind(status)
            .bind(link)
            .execute(&mut *tx)
            .await?;
    }

    let role = format!("rls_caller_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE ROLE {role} NOLOGIN")).execute(&mut *tx).await?;
    sqlx::query(&format!(
        "GRANT SELECT, INSERT, UPDATE, DELETE ON profiles, surveys, responses, magic_links TO {role}"
    ))
    .execute(&mut *tx)
    .await?;
    sqlx::query(&format!("SET LOCAL ROLE {role}")).execute(&mut *tx).await?;

    Ok((tx, Fixture { owner, active, draft }))
}

async fn act_as(tx: &mut Transaction<'static, Postgres>, role: &str, account: Option<Uuid>, survey: Option<Uuid>) -> Result<()> {
    sqlx::query(
        "SELECT set_config('app.principal_role', $1, true), \
                set_config('app.account_id', $2, true), \
                set_config('app.survey_id', $3, true)",
    )
    .bind(role)
    .bind(account.map(|id| id.to_string()).unwrap_or_default())
    .bind(survey.map(|id| id.to_string()).unwrap_or_default())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Whether the insert passed the policies; a policy violation is rolled back to a savepoint
async fn try_insert_response(tx: &mut Transaction<'static, Postgres>, survey: Uuid) -> Result<bool> {
    sqlx::query("SAVEPOINT attempt").execute(&mut **tx).await?;
    let result = sqlx::query("INSERT INTO responses (id, survey_id, respondent_id) VALUES ($1, $2, 'rls')")
        .bind(Uuid::new_v4())
        .bind(survey)
        .execute(&mut **tx)
        .await;
    match result {
        Ok(_) => {
            sqlx::query("RELEASE SAVEPOINT attempt").execute(&mut **tx).await?;
            Ok(true)
        }
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42501") => {
            sqlx::query("ROLLBACK TO SAVEPOINT attempt").execute(&mut **tx).await?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn count(tx: &mut Transaction<'static, Postgres>, sql: &str, survey: Uuid) -> Result<i64> {
    Ok(sqlx::query_scalar(sql).bind(survey).fetch_one(&mut **tx).await?)
}

const RESPONSES: &str = "SELECT COUNT(*) FROM responses WHERE survey_id = $1";
const SURVEYS: &str = "SELECT COUNT(*) FROM surveys WHERE id = $1";

#[tokio::test]
async fn anonymous_inserts_into_accepting_surveys_without_reading_back() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let (mut tx, f) = begin(&pool).await?;

    act_as(&mut tx, "anon", None, None).await?;
    assert!(try_insert_response(&mut tx, f.active).await?);
    assert!(!try_insert_response(&mut tx, f.draft).await?);
    assert_eq!(count(&mut tx, RESPONSES, f.active).await?, 0);
    assert_eq!(count(&mut tx, SURVEYS, f.active).await?, 0);

    act_as(&mut tx, "authenticated", Some(f.owner), None).await?;
    assert_eq!(count(&mut tx, RESPONSES, f.active).await?, 1);

    tx.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn owners_cannot_insert_into_their_draft_surveys() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let (mut tx, f) = begin(&pool).await?;

    act_as(&mut tx, "authenticated", Some(f.owner), None).await?;
    assert!(!try_insert_response(&mut tx, f.draft).await?);
    assert!(try_insert_response(&mut tx, f.active).await?);
    assert_eq!(count(&mut tx, SURVEYS, f.draft).await?, 1);

    act_as(&mut tx, "authenticated", Some(Uuid::new_v4()), None).await?;
    assert!(!try_insert_response(&mut tx, f.active).await?);
    assert_eq!(count(&mut tx, RESPONSES, f.active).await?, 0);
    assert_eq!(count(&mut tx, SURVEYS, f.active).await?, 0);

    tx.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn sessions_stay_on_their_survey_and_service_sees_everything() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let (mut tx, f) = begin(&pool).await?;

    act_as(&mut tx, "magic_link", None, Some(f.active)).await?;
    assert!(try_insert_response(&mut tx, f.active).await?);
    assert!(!try_insert_response(&mut tx, f.draft).await?);
    assert_eq!(count(&mut tx, SURVEYS, f.active).await?, 1);
    assert_eq!(count(&mut tx, SURVEYS, f.draft).await?, 0);

    act_as(&mut tx, "service_role", None, None).await?;
    assert_eq!(count(&mut tx, RESPONSES, f.active).await?, 1);
    assert_eq!(count(&mut tx, SURVEYS, f.draft).await?, 1);

    tx.rollback().await?;
    Ok(())
}
