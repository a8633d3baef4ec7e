//! Resource command handlers

use anyhow::{Result, bail};
use clap::Subcommand;
use cloudops_client::OrchestratorClient;
use cloudops_core::domain::resource::{Resource, ResourceStatus};
use cloudops_core::dto::resource::CreateResource;
use colored::*;
use std::path::PathBuf;
use uuid::Uuid;

use super::load_json;
use crate::config::Config;

/// Resource subcommands
#[derive(Subcommand)]
pub enum ResourceCommands {
    /// Register a new infrastructure resource
    Create {
        #[arg(long)]
        name: String,

        /// Resource kind (e.g. compute, database, cluster)
        #[arg(long)]
        kind: String,

        /// Cloud provider (e.g. aws, gcp, azure)
        #[arg(long)]
        provider: String,

        #[arg(long)]
        region: Option<String>,

        /// JSON file with the resource configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tag as key=value; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show a resource, including its last automation outcome
    Get {
        /// Resource ID
        id: Uuid,
    },
}

/// Handle resource commands
pub async fn handle_resource_command(command: ResourceCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(config.orchestrator_url.clone());

    match command {
        ResourceCommands::Create {
            name,
            kind,
            provider,
            region,
            config,
            tags,
        } => {
            let config = match load_json(config.as_deref())? {
                serde_json::Value::Null => serde_json::json!({}),
                other => other,
            };
            let request = CreateResource {
                name,
                kind,
                provider,
                region,
                config,
                tags: parse_tags(&tags)?,
            };

            let resource = client.create_resource(request).await?;
            println!("{} Resource created", "✓".green());
            print_resource(&resource);
            Ok(())
        }
        ResourceCommands::Get { id } => {
            match client.get_resource(id).await? {
                Some(resource) => print_resource(&resource),
                None => println!("{}", format!("Resource {} not found.", id).yellow()),
            }
            Ok(())
        }
    }
}

/// Collects `key=value` pairs into a JSON object
fn parse_tags(raw: &[String]) -> Result<serde_json::Value> {
    let mut tags = serde_json::Map::new();

    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("invalid tag '{}': expected key=value", entry);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid tag '{}': empty key", entry);
        }
        tags.insert(key.to_string(), serde_json::Value::String(value.trim().to_string()));
    }

    Ok(serde_json::Value::Object(tags))
}

fn print_resource(resource: &Resource) {
    println!("{}", "Resource Details:".bold());
    println!("  ID:        {}", resource.id.to_string().cyan());
    println!("  Name:      {}", resource.name);
    println!("  Kind:      {}", resource.kind);
    println!("  Provider:  {}", resource.provider);
    if let Some(region) = &resource.region {
        println!("  Region:    {}", region);
    }
    println!("  Status:    {}", colorize_status(resource.status));
    println!(
        "  Updated:   {}",
        resource
            .updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );

    if let Some(audit) = resource.last_automation() {
        println!("\n{}", "Last Automation:".bold());
        println!("  Job ID:    {}", audit.job_id.to_string().dimmed());
        println!(
            "  Success:   {}",
            if audit.success { "✓".green() } else { "✗".red() }
        );
    }
}

fn colorize_status(status: ResourceStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ResourceStatus::Running => label.green(),
        ResourceStatus::Failed => label.red(),
        _ => label.yellow(),
    }
}
