use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::services::ServiceError;

/// Exit status when a request was refused (bad token, ineligible survey, ...)
pub const EXIT_REJECTED: i32 = 2;
/// Exit status for storage, configuration and other unexpected failures
pub const EXIT_FAILURE: i32 = 1;

/// Output a success message in the appropriate format.
///
/// In JSON mode the result is nested under `data`; in text mode each of its
/// top-level fields is printed on its own line.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_envelope(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error_envelope(message, error_code))?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// `{success: true, data}`; a command without a result reports its message as data
pub fn success_envelope(message: &str, data: Option<Value>) -> Value {
    json!({
        "success": true,
        "data": data.unwrap_or_else(|| json!({ "message": message }))
    })
}

pub fn error_envelope(message: &str, error_code: Option<&str>) -> Value {
    let mut response = json!({
        "success": false,
        "error": message
    });
    if let Some(code) = error_code {
        response["code"] = json!(code);
    }
    response
}

/// Rejections exit with [`EXIT_REJECTED`]; everything else with [`EXIT_FAILURE`]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ServiceError>() {
        Some(e) if e.is_rejection() => EXIT_REJECTED,
        _ => EXIT_FAILURE,
    }
}
