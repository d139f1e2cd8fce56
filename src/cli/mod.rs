pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{self, AppConfig};
use crate::database::{DatabaseManager, PgStore};

#[derive(Parser)]
#[command(name = "surveyctl")]
#[command(about = "surveyctl - operator interface for magic links and survey access policy")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Issue, preview, and redeem magic links")]
    MagicLink {
        #[command(subcommand)]
        cmd: commands::magic_link::MagicLinkCommands,
    },

    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Mint operator bearer tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Evaluate the access policy against stored surveys")]
    Policy {
        #[command(subcommand)]
        cmd: commands::policy::PolicyCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::MagicLink { cmd } => commands::magic_link::handle(cmd, output_format).await,
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Policy { cmd } => commands::policy::handle(cmd, output_format).await,
    }
}

/// Validated configuration plus a migrated-or-not Postgres store
pub(crate) async fn connect() -> anyhow::Result<(&'static AppConfig, Arc<PgStore>)> {
    let config = config::config();
    config.validate()?;
    let pool = DatabaseManager::connect(&config.database).await?;
    Ok((config, Arc::new(PgStore::new(pool))))
}
