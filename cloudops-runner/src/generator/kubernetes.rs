//! Kubernetes manifest generator

use cloudops_core::domain::config::{KubernetesManifest, KubernetesStackConfig, ObjectMeta, ServiceType};
use cloudops_core::domain::task::{AutomationTask, Priority, TaskKind};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GenerationError, invoke_checked, task_id};
use crate::invoker::GeneratorInvoker;

/// Port the generated Service exposes in a full stack
const STACK_SERVICE_PORT: u16 = 80;

/// The three manifests of an application stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesStack {
    pub deployment: String,
    pub service: String,
    pub ingress: String,
}

pub struct KubernetesGenerator {
    invoker: Arc<dyn GeneratorInvoker>,
}

impl KubernetesGenerator {
    pub fn new(invoker: Arc<dyn GeneratorInvoker>) -> Self {
        Self { invoker }
    }

    /// Generates YAML for a single manifest
    ///
    /// Falls back to serializing `manifest` itself when no YAML file is produced.
    pub async fn generate(
        &self,
        manifest: &KubernetesManifest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        info!(kind = %manifest.kind, name = %manifest.metadata.name, "Generating Kubernetes manifest");

        let task = AutomationTask::new(
            task_id("k8s"),
            TaskKind::Kubernetes,
            format!(
                "Generate a Kubernetes {} manifest with the following specifications",
                manifest.kind
            ),
            serde_json::to_value(manifest).unwrap_or_default(),
        )
        .with_priority(Priority::High);

        let result =
            invoke_checked(self.invoker.as_ref(), &task, cancel, GenerationError::Kubernetes).await?;

        let kind = manifest.kind.to_lowercase();
        let named = result.find_artifact(|p| {
            let name = file_name(p).to_lowercase();
            name == format!("{kind}.yaml") || name == format!("{kind}.yml")
        });
        if let Some(file) = named.or_else(|| result.find_artifact(is_yaml)) {
            return Ok(file.content.clone());
        }

        debug!("No YAML produced, serializing manifest locally");
        serde_yaml::to_string(manifest).map_err(|e| GenerationError::Kubernetes(e.to_string()))
    }

    pub async fn generate_deployment(
        &self,
        spec: &DeploymentSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_manifest(), cancel).await
    }

    pub async fn generate_service(
        &self,
        spec: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_manifest(), cancel).await
    }

    pub async fn generate_ingress(
        &self,
        spec: &IngressSpec,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.generate(&spec.to_manifest(), cancel).await
    }

    /// Generates Deployment, Service and Ingress concurrently
    ///
    /// Fails as a whole if any of the three fails.
    pub async fn generate_full_stack(
        &self,
        config: &KubernetesStackConfig,
        cancel: &CancellationToken,
    ) -> Result<KubernetesStack, GenerationError> {
        let namespace = Some(config.namespace.clone());

        let deployment = DeploymentSpec {
            name: config.name.clone(),
            namespace: namespace.clone(),
            replicas: config.replicas,
            image: config.image.clone(),
            port: config.port,
            env: BTreeMap::new(),
            labels: None,
        };
        let service = ServiceSpec {
            name: config.name.clone(),
            namespace: namespace.clone(),
            service_type: config.service_type.unwrap_or_default(),
            port: STACK_SERVICE_PORT,
            target_port: config.port,
            selector: None,
        };
        let ingress = IngressSpec {
            name: config.name.clone(),
            namespace,
            host: config.host.clone(),
            service_name: config.name.clone(),
            service_port: STACK_SERVICE_PORT,
            tls: false,
        };

        let (deployment, service, ingress) = tokio::try_join!(
            self.generate_deployment(&deployment, cancel),
            self.generate_service(&service, cancel),
            self.generate_ingress(&ingress, cancel),
        )?;

        Ok(KubernetesStack {
            deployment,
            service,
            ingress,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentSpec {
    pub name: String,
    pub namespace: Option<String>,
    pub replicas: u32,
    pub image: String,
    pub port: u16,
    pub env: BTreeMap<String, String>,
    /// Defaults to `app: <name>`
    pub labels: Option<BTreeMap<String, String>>,
}

impl DeploymentSpec {
    pub fn to_manifest(&self) -> KubernetesManifest {
        let app = app_selector(&self.name);
        let env: Vec<_> = self
            .env
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();

        KubernetesManifest {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            metadata: ObjectMeta {
                name: self.name.clone(),
                namespace: Some(namespace_or_default(&self.namespace)),
                labels: Some(self.labels.clone().unwrap_or_else(|| app.clone())),
            },
            spec: json!({
                "replicas": self.replicas,
                "selector": { "matchLabels": app },
                "template": {
                    "metadata": { "labels": app },
                    "spec": {
                        "containers": [{
                            "name": self.name,
                            "image": self.image,
                            "ports": [{ "containerPort": self.port }],
                            "env": env,
                        }]
                    }
                }
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub namespace: Option<String>,
    pub service_type: ServiceType,
    pub port: u16,
    pub target_port: u16,
    /// Defaults to `app: <name>`
    pub selector: Option<BTreeMap<String, String>>,
}

impl ServiceSpec {
    pub fn to_manifest(&self) -> KubernetesManifest {
        let selector = self
            .selector
            .clone()
            .unwrap_or_else(|| app_selector(&self.name));

        KubernetesManifest {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            metadata: ObjectMeta {
                name: self.name.clone(),
                namespace: Some(namespace_or_default(&self.namespace)),
                labels: None,
            },
            spec: json!({
                "type": self.service_type,
                "selector": selector,
                "ports": [{
                    "port": self.port,
                    "targetPort": self.target_port,
                    "protocol": "TCP",
                }]
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngressSpec {
    pub name: String,
    pub namespace: Option<String>,
    pub host: String,
    pub service_name: String,
    pub service_port: u16,
    /// Adds a TLS block using the `<name>-tls` secret
    pub tls: bool,
}

impl IngressSpec {
    pub fn to_manifest(&self) -> KubernetesManifest {
        let mut spec = json!({
            "rules": [{
                "host": self.host,
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {
                            "service": {
                                "name": self.service_name,
                                "port": { "number": self.service_port },
                            }
                        }
                    }]
                }
            }]
        });

        if self.tls {
            spec["tls"] = json!([{
                "hosts": [self.host],
                "secretName": format!("{}-tls", self.name),
            }]);
        }

        KubernetesManifest {
            api_version: "networking.k8s.io/v1".to_string(),
            kind: "Ingress".to_string(),
            metadata: ObjectMeta {
                name: self.name.clone(),
                namespace: Some(namespace_or_default(&self.namespace)),
                labels: None,
            },
            spec,
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn is_yaml(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml")
}

fn app_selector(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn namespace_or_default(namespace: &Option<String>) -> String {
    namespace.clone().unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FakeInvoker;

    fn stack_config() -> KubernetesStackConfig {
        KubernetesStackConfig {
            name: "app".into(),
            namespace: "prod".into(),
            replicas: 3,
            image: "nginx:latest".into(),
            port: 80,
            host: "app.example.com".into(),
            service_type: None,
        }
    }

    #[tokio::test]
    async fn test_full_stack_returns_three_manifests() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("notes.md", "no yaml here")]));
        let generator = KubernetesGenerator::new(invoker.clone());

        let stack = generator
            .generate_full_stack(&stack_config(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(stack.deployment.contains("kind: Deployment"));
        assert!(stack.deployment.contains("replicas: 3"));
        assert!(stack.service.contains("kind: Service"));
        assert!(stack.service.contains("type: ClusterIP"));
        assert!(stack.ingress.contains("kind: Ingress"));
        assert!(stack.ingress.contains("host: app.example.com"));
        assert!(stack.ingress.contains("namespace: prod"));

        let tasks = invoker.recorded();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.id.starts_with("k8s-") && t.priority == Priority::High));
    }

    #[tokio::test]
    async fn test_full_stack_picks_manifest_by_kind() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[
            ("deployment.yaml", "kind: Deployment"),
            ("ingress.yaml", "kind: Ingress"),
            ("service.yml", "kind: Service"),
        ]));
        let generator = KubernetesGenerator::new(invoker);

        let stack = generator
            .generate_full_stack(&stack_config(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stack.deployment, "kind: Deployment");
        assert_eq!(stack.service, "kind: Service");
        assert_eq!(stack.ingress, "kind: Ingress");
    }

    #[tokio::test]
    async fn test_generated_stack_from_cli_keeps_each_manifest() {
        let root = tempfile::tempdir().unwrap();
        let invoker = crate::invoker::CliInvoker::new(root.path(), "sh").with_args(vec![
            "-c".into(),
            "echo 'kind: Deployment' > deployment.yaml; \
             echo 'kind: Service' > service.yaml; \
             echo 'kind: Ingress' > ingress.yaml"
                .into(),
            "generator".into(),
        ]);
        let generator = KubernetesGenerator::new(Arc::new(invoker));

        let stack = generator
            .generate_full_stack(&stack_config(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stack.deployment.trim(), "kind: Deployment");
        assert_eq!(stack.service.trim(), "kind: Service");
        assert_eq!(stack.ingress.trim(), "kind: Ingress");
    }

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name("out/service.yaml"), "service.yaml");
        assert_eq!(file_name("ingress.yml"), "ingress.yml");
    }

    #[tokio::test]
    async fn test_full_stack_fails_as_a_whole() {
        let generator = KubernetesGenerator::new(Arc::new(FakeInvoker::failing("boom")));

        let err = generator
            .generate_full_stack(&stack_config(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Kubernetes generation failed: boom");
    }

    #[tokio::test]
    async fn test_prefers_generated_yaml() {
        let invoker = Arc::new(FakeInvoker::succeeding(&[("deployment.yml", "generated: true")]));
        let generator = KubernetesGenerator::new(invoker);

        let yaml = generator
            .generate(&IngressSpec {
                name: "web".into(),
                namespace: None,
                host: "web.example.com".into(),
                service_name: "web".into(),
                service_port: 80,
                tls: true,
            }
            .to_manifest(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(yaml, "generated: true");
    }

    #[test]
    fn test_service_targets_container_port() {
        let manifest = ServiceSpec {
            name: "api".into(),
            namespace: None,
            service_type: ServiceType::LoadBalancer,
            port: 80,
            target_port: 8080,
            selector: None,
        }
        .to_manifest();

        assert_eq!(manifest.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(manifest.spec["type"], "LoadBalancer");
        assert_eq!(manifest.spec["selector"]["app"], "api");
        assert_eq!(manifest.spec["ports"][0]["targetPort"], 8080);
    }

    #[test]
    fn test_ingress_tls_uses_named_secret() {
        let spec = IngressSpec {
            name: "web".into(),
            namespace: Some("edge".into()),
            host: "web.example.com".into(),
            service_name: "web-svc".into(),
            service_port: 80,
            tls: true,
        };

        let manifest = spec.to_manifest();
        assert_eq!(manifest.spec["tls"][0]["secretName"], "web-tls");
        assert_eq!(manifest.spec["tls"][0]["hosts"][0], "web.example.com");
        assert_eq!(
            manifest.spec["rules"][0]["http"]["paths"][0]["backend"]["service"]["name"],
            "web-svc"
        );

        let plain = IngressSpec { tls: false, ..spec }.to_manifest();
        assert!(plain.spec.get("tls").is_none());
    }

    #[test]
    fn test_deployment_env_and_labels() {
        let manifest = DeploymentSpec {
            name: "worker".into(),
            namespace: None,
            replicas: 2,
            image: "worker:1".into(),
            port: 9000,
            env: BTreeMap::from([("MODE".to_string(), "batch".to_string())]),
            labels: None,
        }
        .to_manifest();

        assert_eq!(manifest.metadata.labels.unwrap()["app"], "worker");
        let container = &manifest.spec["template"]["spec"]["containers"][0];
        assert_eq!(container["env"][0]["name"], "MODE");
        assert_eq!(container["ports"][0]["containerPort"], 9000);
        assert_eq!(manifest.spec["selector"]["matchLabels"]["app"], "worker");
    }
}
