use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::JwtSessions;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::clock::SystemClock;
use crate::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Bearer token for an account (survey owner)")]
    Account {
        #[arg(help = "Account id")]
        account_id: Uuid,
    },

    #[command(about = "Bearer token with service-level standing")]
    Service,
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    config.validate()?;
    let sessions = JwtSessions::new(&config.security, Arc::new(SystemClock));

    let (role, token) = match cmd {
        TokenCommands::Account { account_id } => ("authenticated", sessions.issue_account_token(account_id)?),
        TokenCommands::Service => ("service_role", sessions.issue_service_token()?),
    };

    output_success(
        &output_format,
        "Token minted",
        Some(json!({
            "role": role,
            "access_token": token,
            "expires_in_hours": config.security.session_expiry_hours,
        })),
    )
}
