//! Shared output formatting utilities for CLI commands
//!
//! Every command renders a [`ServiceResponse`] so scripts can branch on the
//! `status` and `kind` fields regardless of the chosen format.

use crate::errors::{Result as ServiceResult, ServiceResponse};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Render data in the specified format
pub fn render<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
        }
        OutputFormat::Yaml => serde_yaml::to_string(data).context("Failed to serialize to YAML"),
    }
}

/// Print a service result and report whether it succeeded
pub fn emit<T: Serialize>(result: ServiceResult<T>, format: OutputFormat) -> Result<bool> {
    if let Err(e) = &result {
        tracing::debug!(kind = %e.kind(), retryable = e.is_retryable(), "Command failed");
    }
    let response = ServiceResponse::from(result);
    println!("{}", render(&response, format)?.trim_end());
    Ok(response.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_render_success_json() {
        let response: ServiceResponse<Vec<&str>> = ServiceResponse::from(Ok(vec!["db"]));
        let rendered = render(&response, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["payload"][0], "db");
    }

    #[test]
    fn test_render_error_yaml() {
        let response: ServiceResponse<()> =
            ServiceResponse::from(Err(Error::lease_contention("secrets_manager:policies:project_1")));
        let rendered = render(&response, OutputFormat::Yaml).unwrap();
        assert!(rendered.contains("status: error"));
        assert!(rendered.contains("kind: lease_contention"));
    }
}
