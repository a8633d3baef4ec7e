//! Terraform generator

use cloudops_core::domain::config::{CloudProvider, TerraformConfig, TerraformResource};
use cloudops_core::domain::task::{AutomationTask, Priority, TaskKind};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GenerationError, invoke_checked, task_id};
use crate::invoker::GeneratorInvoker;
use crate::invoker::batch::execute_parallel;

/// File the generator is asked to write
const MAIN_TF: &str = "main.tf";

pub struct TerraformGenerator {
    invoker: Arc<dyn GeneratorInvoker>,
}

impl TerraformGenerator {
    pub fn new(invoker: Arc<dyn GeneratorInvoker>) -> Self {
        Self { invoker }
    }

    /// Generates `main.tf` for `config`
    pub async fn generate(
        &self,
        config: &TerraformConfig,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        info!(provider = %config.provider, region = %config.region, "Generating Terraform configuration");

        let task = self.task(config, task_id("terraform"), Priority::High);
        let result =
            invoke_checked(self.invoker.as_ref(), &task, cancel, GenerationError::Terraform).await?;

        match result.find_artifact(|p| p.contains(MAIN_TF)) {
            Some(main_tf) => Ok(main_tf.content.clone()),
            None => {
                debug!("No main.tf produced, rendering configuration locally");
                Ok(render_hcl(config))
            }
        }
    }

    /// Generates one module per config in parallel
    ///
    /// Keys are `module-<index>`; failed or file-less modules are left out.
    pub async fn generate_modules(
        &self,
        configs: &[TerraformConfig],
        cancel: &CancellationToken,
    ) -> BTreeMap<String, String> {
        let tasks: Vec<_> = configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                self.task(
                    config,
                    task_id(&format!("terraform-module-{}", index)),
                    Priority::Medium,
                )
            })
            .collect();

        let results = execute_parallel(self.invoker.as_ref(), &tasks, cancel).await;

        results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.success)
            .filter_map(|(index, result)| {
                result
                    .find_artifact(|p| p.contains(MAIN_TF))
                    .map(|f| (format!("module-{}", index), f.content.clone()))
            })
            .collect()
    }

    pub async fn generate_ec2_instance(
        &self,
        spec: &Ec2InstanceSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_config(), cancel).await
    }

    pub async fn generate_rds_instance(
        &self,
        spec: &RdsInstanceSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_config(), cancel).await
    }

    fn task(&self, config: &TerraformConfig, id: String, priority: Priority) -> AutomationTask {
        AutomationTask::new(
            id,
            TaskKind::Terraform,
            describe(config),
            serde_json::to_value(config).unwrap_or_default(),
        )
        .with_priority(priority)
    }
}

/// A single AWS EC2 instance
#[derive(Debug, Clone)]
pub struct Ec2InstanceSpec {
    pub name: String,
    pub instance_type: String,
    pub ami: String,
    pub region: String,
    pub tags: BTreeMap<String, String>,
}

impl Ec2InstanceSpec {
    pub fn to_config(&self) -> TerraformConfig {
        let mut config = Map::new();
        config.insert("instance_type".into(), json!(self.instance_type));
        config.insert("ami".into(), json!(self.ami));
        config.insert("tags".into(), json!(self.tags));

        aws_config(&self.region, "instance", &self.name, config)
    }
}

/// A single AWS RDS instance with 20 GB of storage
#[derive(Debug, Clone)]
pub struct RdsInstanceSpec {
    pub name: String,
    pub engine: String,
    pub instance_class: String,
    pub region: String,
    pub username: String,
    /// Defaults to `true`
    pub skip_final_snapshot: Option<bool>,
}

impl RdsInstanceSpec {
    pub fn to_config(&self) -> TerraformConfig {
        let mut config = Map::new();
        config.insert("engine".into(), json!(self.engine));
        config.insert("instance_class".into(), json!(self.instance_class));
        config.insert("allocated_storage".into(), json!(20));
        config.insert("username".into(), json!(self.username));
        config.insert(
            "skip_final_snapshot".into(),
            json!(self.skip_final_snapshot.unwrap_or(true)),
        );

        aws_config(&self.region, "db_instance", &self.name, config)
    }
}

fn aws_config(region: &str, resource_type: &str, name: &str, config: Map<String, Value>) -> TerraformConfig {
    TerraformConfig {
        provider: CloudProvider::Aws,
        region: region.to_string(),
        resources: vec![TerraformResource {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            config,
        }],
        variables: None,
        outputs: None,
    }
}

fn describe(config: &TerraformConfig) -> String {
    let resources = config
        .resources
        .iter()
        .map(|r| format!("{}.{}", r.resource_type, r.name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Generate Terraform configuration for {} in {} region. Resources: {}. \
         Include proper variables, outputs, and best practices for production use.",
        config.provider, config.region, resources
    )
}

/// Renders `config` as HCL without involving the generator
pub fn render_hcl(config: &TerraformConfig) -> String {
    let provider = config.provider;
    let region = format_hcl_value(&json!(config.region));

    let mut tf = format!(
        "# Generated Terraform Configuration
# Provider: {provider}
# Region: {}

terraform {{
  required_version = \">= 1.0\"
  required_providers {{
    {provider} = {{
      source  = \"hashicorp/{provider}\"
      version = \"~> 5.0\"
    }}
  }}
}}

provider \"{provider}\" {{
  region = {region}
}}
",
        config.region
    );

    if let Some(variables) = &config.variables {
        for (name, default) in variables {
            tf.push_str(&format!(
                "\nvariable \"{}\" {{\n  default = {}\n}}\n",
                name,
                format_hcl_value(default)
            ));
        }
    }

    for resource in &config.resources {
        tf.push_str(&format!(
            "\nresource \"{}_{}\" \"{}\" {{\n",
            provider, resource.resource_type, resource.name
        ));
        for (key, value) in &resource.config {
            tf.push_str(&format!("  {} = {}\n", key, format_hcl_value(value)));
        }
        tf.push_str("}\n");
    }

    if let Some(outputs) = &config.outputs {
        for expr in outputs {
            tf.push_str(&format!(
                "\noutput \"{}\" {{\n  value = {}\n}}\n",
                expr.replace('.', "_"),
                expr
            ));
        }
    }

    tf
}

/// Formats a JSON value as an HCL literal
///
/// Strings are quoted with `\`, `"` and newlines escaped; booleans and
/// numbers are written bare; everything else is written as JSON.
pub fn format_hcl_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("\"{}\"", escaped)
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FakeInvoker;

    fn web_config() -> TerraformConfig {
        let mut config = Map::new();
        config.insert("ami".into(), json!("ami-123"));
        config.insert("monitoring".into(), json!(true));
        config.insert("count".into(), json!(2));

        aws_config("eu-west-1", "instance", "web", config)
    }

    #[tokio::test]
    async fn test_returns_generated_main_tf() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[
            ("README.md", "docs"),
            ("main.tf", "resource \"aws_instance\" \"web\" {}"),
        ]));
        let generator = TerraformGenerator::new(invoker.clone());

        let tf = generator
            .generate(&web_config(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tf, "resource \"aws_instance\" \"web\" {}");

        let tasks = invoker.recorded();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].id.starts_with("terraform-"));
        assert_eq!(tasks[0].kind, TaskKind::Terraform);
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].context["region"], "eu-west-1");
        assert!(tasks[0].description.contains("instance.web"));
    }

    #[tokio::test]
    async fn test_falls_back_to_local_rendering() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("notes.md", "nothing useful")]));
        let generator = TerraformGenerator::new(invoker);

        let tf = generator
            .generate(&web_config(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(tf.contains("provider \"aws\" {\n  region = \"eu-west-1\"\n}"));
        assert!(tf.contains("resource \"aws_instance\" \"web\" {"));
        assert!(tf.contains("  ami = \"ami-123\""));
        assert!(tf.contains("  monitoring = true"));
        assert!(tf.contains("  count = 2"));
    }

    #[tokio::test]
    async fn test_invocation_failure_is_an_error() {
        let generator = TerraformGenerator::new(Arc::new(FakeInvoker::failing("exit code 1")));

        let err = generator
            .generate(&web_config(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Terraform generation failed: exit code 1");
    }

    #[tokio::test]
    async fn test_cancelled_failure_reports_cancellation() {
        let generator = TerraformGenerator::new(Arc::new(FakeInvoker::failing("task cancelled")));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = generator.generate(&web_config(), &cancel).await.unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
    }

    #[tokio::test]
    async fn test_generate_modules_keys_by_index() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("main.tf", "module body")]));
        let generator = TerraformGenerator::new(invoker.clone());

        let modules = generator
            .generate_modules(&[web_config(), TerraformConfig::default()], &CancellationToken::new())
            .await;

        assert_eq!(modules.len(), 2);
        assert_eq!(modules["module-0"], "module body");
        assert_eq!(modules["module-1"], "module body");
        assert!(invoker.recorded().iter().all(|t| t.priority == Priority::Medium));
    }

    #[test]
    fn test_rds_spec_defaults() {
        let config = RdsInstanceSpec {
            name: "db".into(),
            engine: "postgres".into(),
            instance_class: "db.t3.micro".into(),
            region: "us-east-1".into(),
            username: "admin".into(),
            skip_final_snapshot: None,
        }
        .to_config();

        let resource = &config.resources[0];
        assert_eq!(resource.resource_type, "db_instance");
        assert_eq!(resource.config["allocated_storage"], 20);
        assert_eq!(resource.config["skip_final_snapshot"], true);
    }

    #[test]
    fn test_format_hcl_value_escapes_strings() {
        assert_eq!(format_hcl_value(&json!("a \"b\"\nc\\d")), r#""a \"b\"\nc\\d""#);
        assert_eq!(format_hcl_value(&json!(false)), "false");
        assert_eq!(format_hcl_value(&json!(1.5)), "1.5");
        assert_eq!(format_hcl_value(&json!({ "Name": "web" })), r#"{"Name":"web"}"#);
        assert_eq!(format_hcl_value(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn test_render_hcl_variables_and_outputs() {
        let mut config = web_config();
        let mut variables = Map::new();
        variables.insert("env".into(), json!("prod"));
        config.variables = Some(variables);
        config.outputs = Some(vec!["aws_instance.web.id".into()]);

        let tf = render_hcl(&config);

        assert!(tf.contains("variable \"env\" {\n  default = \"prod\"\n}"));
        assert!(tf.contains("output \"aws_instance_web_id\" {\n  value = aws_instance.web.id\n}"));
        assert!(tf.contains("source  = \"hashicorp/aws\""));
    }
}
