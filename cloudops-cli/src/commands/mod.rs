//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod resource;

pub use job::JobCommands;
pub use resource::ResourceCommands;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Automation job submission and tracking
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Infrastructure resource records
    Resource {
        #[command(subcommand)]
        command: ResourceCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Resource { command } => {
            resource::handle_resource_command(command, config).await
        }
    }
}

/// Reads a JSON document from `path`, or `null` when no file was given
pub(crate) fn load_json(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::Value::Null);
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_json_without_file_is_null() {
        assert!(load_json(None).unwrap().is_null());
    }

    #[test]
    fn test_load_json_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "region": "eu-west-1" }"#).unwrap();

        let value = load_json(Some(&path)).unwrap();
        assert_eq!(value["region"], "eu-west-1");
    }

    #[test]
    fn test_load_json_reports_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ region: ").unwrap();

        let err = load_json(Some(&path)).unwrap_err();
        assert!(err.to_string().ends_with("is not valid JSON"));

        let missing = load_json(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(missing.to_string().starts_with("Failed to read"));
    }
}
