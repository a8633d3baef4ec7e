//! CloudOps CLI
//!
//! Command-line interface for submitting automation jobs to the CloudOps
//! orchestrator and inspecting resources.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "cloudops")]
#[command(about = "CloudOps automation CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "CLOUDOPS_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{JobCommands, ResourceCommands};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_terraform_submission() {
        let cli = Cli::try_parse_from([
            "cloudops",
            "--orchestrator-url",
            "http://orchestrator:9000",
            "job",
            "terraform",
            "res-42",
            "--config",
            "infra.json",
        ])
        .unwrap();

        assert_eq!(cli.orchestrator_url, "http://orchestrator:9000");
        match cli.command {
            Commands::Job {
                command: JobCommands::Terraform { resource_id, config },
            } => {
                assert_eq!(resource_id, "res-42");
                assert_eq!(config.unwrap().to_str(), Some("infra.json"));
            }
            _ => panic!("expected job terraform"),
        }
    }

    #[test]
    fn test_parse_wait_defaults() {
        let id = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from(["cloudops", "job", "wait", &id.to_string()]).unwrap();

        match cli.command {
            Commands::Job {
                command:
                    JobCommands::Wait {
                        id: parsed,
                        timeout,
                        interval,
                    },
            } => {
                assert_eq!(parsed, id);
                assert_eq!(timeout, 600);
                assert_eq!(interval, 2);
            }
            _ => panic!("expected job wait"),
        }
    }

    #[test]
    fn test_rejects_malformed_job_id() {
        assert!(Cli::try_parse_from(["cloudops", "job", "status", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_parse_resource_create() {
        let cli = Cli::try_parse_from([
            "cloudops", "resource", "create", "--name", "api", "--kind", "compute", "--provider",
            "aws", "--tag", "team=platform",
        ])
        .unwrap();

        match cli.command {
            Commands::Resource {
                command:
                    ResourceCommands::Create {
                        name,
                        region,
                        tags,
                        ..
                    },
            } => {
                assert_eq!(name, "api");
                assert!(region.is_none());
                assert_eq!(tags, vec!["team=platform"]);
            }
            _ => panic!("expected resource create"),
        }
    }
}
