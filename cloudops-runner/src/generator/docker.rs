//! Dockerfile generator

use cloudops_core::domain::config::{DockerConfig, DockerInstruction, DockerInstructionKind, DockerJobConfig};
use cloudops_core::domain::task::{AutomationTask, Priority, TaskKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GenerationError, invoke_checked, task_id};
use crate::invoker::GeneratorInvoker;

pub struct DockerGenerator {
    invoker: Arc<dyn GeneratorInvoker>,
}

impl DockerGenerator {
    pub fn new(invoker: Arc<dyn GeneratorInvoker>) -> Self {
        Self { invoker }
    }

    /// Generates a Dockerfile for `config`
    pub async fn generate(
        &self,
        config: &DockerConfig,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        info!(base_image = %config.base_image, "Generating Dockerfile");

        let task = AutomationTask::new(
            task_id("docker"),
            TaskKind::Docker,
            format!("Generate a Dockerfile based on {}", config.base_image),
            serde_json::to_value(config).unwrap_or_default(),
        )
        .with_priority(Priority::High);

        let result =
            invoke_checked(self.invoker.as_ref(), &task, cancel, GenerationError::Docker).await?;

        match result.find_artifact(|p| p.to_lowercase().contains("dockerfile")) {
            Some(file) => Ok(file.content.clone()),
            None => {
                debug!("No Dockerfile produced, rendering locally");
                Ok(render_dockerfile(config))
            }
        }
    }

    pub async fn generate_nodejs(
        &self,
        config: &DockerJobConfig,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&nodejs_config(config), cancel).await
    }

    pub async fn generate_python(
        &self,
        spec: &PythonSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_config(), cancel).await
    }

    /// Renders a two-stage build; no generator is involved
    pub fn generate_multi_stage(spec: &MultiStageSpec) -> String {
        let mut dockerfile = format!(
            "# Build stage\nFROM {} AS builder\nWORKDIR /build\n\n",
            spec.build_image
        );
        for cmd in &spec.build_commands {
            dockerfile.push_str(cmd);
            dockerfile.push('\n');
        }

        dockerfile.push_str(&format!(
            "\n# Runtime stage\nFROM {}\nWORKDIR /app\n\nCOPY --from=builder /build/dist ./dist\n\n",
            spec.runtime_image
        ));
        for cmd in &spec.runtime_commands {
            dockerfile.push_str(cmd);
            dockerfile.push('\n');
        }

        if let Some(port) = spec.port {
            dockerfile.push_str(&format!("\nEXPOSE {}\n", port));
        }

        dockerfile
    }
}

/// Node.js service image built from a job config
pub fn nodejs_config(config: &DockerJobConfig) -> DockerConfig {
    let base_image = config
        .base_image
        .clone()
        .unwrap_or_else(|| format!("node:{}-alpine", config.node_version));

    DockerConfig {
        base_image,
        workdir: Some(config.workdir.clone()),
        commands: vec![
            DockerInstruction::new(DockerInstructionKind::Copy, "package*.json ./"),
            DockerInstruction::new(DockerInstructionKind::Run, "npm ci --only=production"),
            DockerInstruction::new(DockerInstructionKind::Copy, ". ."),
            DockerInstruction::new(DockerInstructionKind::Expose, config.port.to_string()),
            DockerInstruction::new(DockerInstructionKind::Cmd, r#"["node", "index.js"]"#),
        ],
        ports: Some(vec![config.port]),
        env: None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PythonSpec {
    /// Defaults to `3.11`
    pub python_version: Option<String>,
    pub port: Option<u16>,
}

impl PythonSpec {
    pub fn to_config(&self) -> DockerConfig {
        let mut commands = vec![
            DockerInstruction::new(DockerInstructionKind::Copy, "requirements.txt ./"),
            DockerInstruction::new(
                DockerInstructionKind::Run,
                "pip install --no-cache-dir -r requirements.txt",
            ),
            DockerInstruction::new(DockerInstructionKind::Copy, ". ."),
        ];

        if let Some(port) = self.port {
            commands.push(DockerInstruction::new(DockerInstructionKind::Expose, port.to_string()));
        }
        commands.push(DockerInstruction::new(DockerInstructionKind::Cmd, r#"["python", "app.py"]"#));

        DockerConfig {
            base_image: format!(
                "python:{}-slim",
                self.python_version.as_deref().unwrap_or("3.11")
            ),
            workdir: Some("/app".to_string()),
            commands,
            ports: self.port.map(|p| vec![p]),
            env: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiStageSpec {
    pub build_image: String,
    pub runtime_image: String,
    /// Raw Dockerfile lines for the build stage
    pub build_commands: Vec<String>,
    /// Raw Dockerfile lines for the runtime stage
    pub runtime_commands: Vec<String>,
    pub port: Option<u16>,
}

/// Renders `config` as a Dockerfile without involving the generator
pub fn render_dockerfile(config: &DockerConfig) -> String {
    let mut dockerfile = format!("FROM {}\n\n", config.base_image);

    if let Some(workdir) = &config.workdir {
        dockerfile.push_str(&format!("WORKDIR {}\n\n", workdir));
    }

    for cmd in &config.commands {
        dockerfile.push_str(&format!("{} {}\n", cmd.kind, cmd.value));
    }

    if let Some(env) = &config.env {
        dockerfile.push('\n');
        for (key, value) in env {
            dockerfile.push_str(&format!("ENV {}={}\n", key, value));
        }
    }

    dockerfile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FakeInvoker;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_nodejs_fallback_renders_template() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("notes.md", "hi")]));
        let generator = DockerGenerator::new(invoker.clone());

        let dockerfile = generator
            .generate_nodejs(&DockerJobConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            dockerfile,
            "FROM node:20-alpine\n\n\
             WORKDIR /app\n\n\
             COPY package*.json ./\n\
             RUN npm ci --only=production\n\
             COPY . .\n\
             EXPOSE 3000\n\
             CMD [\"node\", \"index.js\"]\n"
        );

        let tasks = invoker.recorded();
        assert_eq!(tasks[0].description, "Generate a Dockerfile based on node:20-alpine");
        assert_eq!(tasks[0].context["baseImage"], "node:20-alpine");
    }

    #[tokio::test]
    async fn test_prefers_generated_dockerfile() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("Dockerfile", "FROM scratch\n")]));
        let generator = DockerGenerator::new(invoker);

        let dockerfile = generator
            .generate_python(&PythonSpec::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dockerfile, "FROM scratch\n");
    }

    #[tokio::test]
    async fn test_failure_is_docker_error() {
        let generator = DockerGenerator::new(Arc::new(FakeInvoker::failing("no files")));

        let err = generator
            .generate_nodejs(&DockerJobConfig::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Dockerfile generation failed: no files");
    }

    #[test]
    fn test_base_image_override() {
        let config = nodejs_config(&DockerJobConfig {
            base_image: Some("node:22-bookworm".into()),
            port: 8080,
            ..Default::default()
        });

        assert_eq!(config.base_image, "node:22-bookworm");
        assert_eq!(config.ports, Some(vec![8080]));
        assert_eq!(config.commands[3].value, "8080");
    }

    #[test]
    fn test_python_config_without_port() {
        let config = PythonSpec::default().to_config();

        assert_eq!(config.base_image, "python:3.11-slim");
        assert!(config.ports.is_none());
        assert!(config.commands.iter().all(|c| c.kind != DockerInstructionKind::Expose));
    }

    #[test]
    fn test_render_appends_env() {
        let config = DockerConfig {
            base_image: "alpine".into(),
            workdir: None,
            commands: vec![DockerInstruction::new(DockerInstructionKind::Run, "apk add curl")],
            ports: None,
            env: Some(BTreeMap::from([("MODE".to_string(), "prod".to_string())])),
        };

        assert_eq!(
            render_dockerfile(&config),
            "FROM alpine\n\nRUN apk add curl\n\nENV MODE=prod\n"
        );
    }

    #[test]
    fn test_multi_stage_template() {
        let dockerfile = DockerGenerator::generate_multi_stage(&MultiStageSpec {
            build_image: "rust:1.85".into(),
            runtime_image: "debian:bookworm-slim".into(),
            build_commands: vec!["COPY . .".into(), "RUN cargo build --release".into()],
            runtime_commands: vec!["CMD [\"./dist/app\"]".into()],
            port: Some(8080),
        });

        assert!(dockerfile.starts_with("# Build stage\nFROM rust:1.85 AS builder\nWORKDIR /build\n\nCOPY . .\n"));
        assert!(dockerfile.contains("FROM debian:bookworm-slim\nWORKDIR /app\n\nCOPY --from=builder /build/dist ./dist\n"));
        assert!(dockerfile.ends_with("CMD [\"./dist/app\"]\n\nEXPOSE 8080\n"));
    }
}
