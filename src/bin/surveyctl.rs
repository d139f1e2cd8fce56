use clap::Parser;
use tracing_subscriber::EnvFilter;

use survey_auth_api::cli::utils::{exit_code, output_error};
use survey_auth_api::cli::{self, Cli, OutputFormat};
use survey_auth_api::services::ServiceError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = cli::run(cli).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => {
                let code = e.downcast_ref::<ServiceError>().map(ServiceError::code);
                output_error(&output_format, &e.to_string(), code)?
            }
        }
        std::process::exit(exit_code(&e));
    }

    Ok(())
}
