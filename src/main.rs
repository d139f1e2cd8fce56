use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use survey_auth_api::app::{self, AppState};
use survey_auth_api::clock::SystemClock;
use survey_auth_api::config;
use survey_auth_api::database::{DatabaseManager, PgStore};
use survey_auth_api::email::build_mailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    config.validate()?;
    tracing::info!("Starting survey-auth-api in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;

    let mailer = build_mailer(&config.email)?;
    let state = AppState::new(config.clone(), Arc::new(PgStore::new(pool)), mailer, Arc::new(SystemClock));

    app::serve(state).await
}
