use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::JwtSessions;
use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::clock::SystemClock;
use crate::email::build_mailer;
use crate::services::{TokenConsumer, TokenIssuer, TokenValidator};

#[derive(Subcommand)]
pub enum MagicLinkCommands {
    #[command(about = "Issue a magic link for an email address on an active survey")]
    Generate {
        #[arg(long, help = "Respondent email address")]
        email: String,
        #[arg(long, help = "Survey id")]
        survey: Uuid,
    },

    #[command(about = "Check a token without spending it")]
    Validate {
        #[arg(help = "Magic link token")]
        token: String,
    },

    #[command(about = "Spend a token and print the resulting session")]
    Use {
        #[arg(help = "Magic link token")]
        token: String,
    },
}

pub async fn handle(cmd: MagicLinkCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (config, store) = connect().await?;
    let clock = Arc::new(SystemClock);

    match cmd {
        MagicLinkCommands::Generate { email, survey } => {
            let mailer = build_mailer(&config.email)?;
            let issuer = TokenIssuer::new(store, mailer, clock, &config.magic_link);
            let issuance = issuer.issue(&email, survey).await?;
            // The process exits right after, so wait for the email to go out
            issuance.delivery.await?;

            let issued = issuance.token;
            output_success(
                &output_format,
                "Magic link issued",
                Some(json!({
                    "email": issued.email,
                    "survey_id": issued.survey_id,
                    "expires_at": issued.expires_at,
                    "link": issued.link_url,
                })),
            )
        }
        MagicLinkCommands::Validate { token } => {
            let preview = TokenValidator::new(store, clock).validate(token.trim()).await?;
            output_success(&output_format, "Token is valid", Some(serde_json::to_value(preview)?))
        }
        MagicLinkCommands::Use { token } => {
            let sessions = JwtSessions::new(&config.security, clock.clone());
            let consumed = TokenConsumer::new(store, sessions, clock).consume(token.trim()).await?;
            output_success(
                &output_format,
                "Token consumed",
                Some(json!({
                    "survey_id": consumed.survey_id,
                    "email": consumed.session.email,
                    "access_token": consumed.session.access_token,
                    "expires_at": consumed.session.expires_at,
                })),
            )
        }
    }
}
