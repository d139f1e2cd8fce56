use anyhow::{anyhow, bail};
use clap::{Subcommand, ValueEnum};
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::database::SurveyStore;
use crate::policy::{authorize, Operation, Principal, Resource};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    Survey,
    Responses,
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    #[command(about = "Ask whether a principal may perform an operation on a survey")]
    Check {
        #[arg(
            long,
            help = "anonymous | account:<id> | respondent:<email>:<survey> | service"
        )]
        principal: String,
        #[arg(long, help = "Survey id")]
        survey: Uuid,
        #[arg(long, help = "read | insert | update | delete")]
        operation: String,
        #[arg(long, value_enum, default_value = "survey", help = "Check the survey row or its responses")]
        target: Target,
    },
}

pub async fn handle(cmd: PolicyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Check {
            principal,
            survey,
            operation,
            target,
        } => {
            let principal = parse_principal(&principal)?;
            let operation: Operation = operation.parse().map_err(|e: String| anyhow!(e))?;

            let (_, store) = connect().await?;
            let survey = store
                .find_survey(survey)
                .await?
                .ok_or_else(|| anyhow!("survey {} not found", survey))?;

            let resource = match target {
                Target::Survey => Resource::survey(&survey),
                Target::Responses => Resource::response_of(&survey),
            };
            let decision = authorize(&principal, &resource, operation);

            output_success(
                &output_format,
                &format!("Decision: {:?}", decision),
                Some(json!({
                    "decision": decision,
                    "principal": principal,
                    "operation": operation,
                    "survey_id": survey.id,
                    "survey_status": survey.status,
                })),
            )
        }
    }
}

pub fn parse_principal(raw: &str) -> anyhow::Result<Principal> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("anonymous"), None, None) => Ok(Principal::Anonymous),
        (Some("service"), None, None) => Ok(Principal::Service),
        (Some("account"), Some(id), None) => Ok(Principal::account(id.parse()?)),
        (Some("respondent"), Some(email), Some(survey)) if !email.is_empty() => Ok(Principal::Respondent {
            email: email.to_string(),
            survey_id: survey.parse()?,
        }),
        _ => bail!("unrecognised principal '{}'", raw),
    }
}
