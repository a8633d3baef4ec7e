//! Typed generator and job configurations
//!
//! Each job action carries its own concrete configuration shape. Missing
//! optional fields fall back to the same defaults the job API documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Terraform
// =============================================================================

/// Cloud provider targeted by a Terraform configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    #[default]
    Aws,
    Gcp,
    Azure,
    Digitalocean,
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Gcp => write!(f, "gcp"),
            CloudProvider::Azure => write!(f, "azure"),
            CloudProvider::Digitalocean => write!(f, "digitalocean"),
        }
    }
}

/// A single Terraform resource block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformResource {
    /// Resource type without the provider prefix (e.g. `instance`)
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// Terraform generation request, also the `provision-terraform` job config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformConfig {
    #[serde(default)]
    pub provider: CloudProvider,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub resources: Vec<TerraformResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            provider: CloudProvider::default(),
            region: default_region(),
            resources: Vec::new(),
            variables: None,
            outputs: None,
        }
    }
}

// =============================================================================
// Kubernetes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// A single Kubernetes object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ClusterIP => write!(f, "ClusterIP"),
            ServiceType::NodePort => write!(f, "NodePort"),
            ServiceType::LoadBalancer => write!(f, "LoadBalancer"),
        }
    }
}

/// Deployment + Service + Ingress request, also the `provision-kubernetes` job config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesStackConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_container_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
}

fn default_app_name() -> String {
    "app".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    3
}

fn default_image() -> String {
    "nginx:latest".to_string()
}

fn default_container_port() -> u16 {
    80
}

fn default_host() -> String {
    "app.example.com".to_string()
}

impl Default for KubernetesStackConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            namespace: default_namespace(),
            replicas: default_replicas(),
            image: default_image(),
            port: default_container_port(),
            host: default_host(),
            service_type: None,
        }
    }
}

// =============================================================================
// Docker
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DockerInstructionKind {
    Run,
    Copy,
    Env,
    Expose,
    Cmd,
    Entrypoint,
}

impl std::fmt::Display for DockerInstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerInstructionKind::Run => write!(f, "RUN"),
            DockerInstructionKind::Copy => write!(f, "COPY"),
            DockerInstructionKind::Env => write!(f, "ENV"),
            DockerInstructionKind::Expose => write!(f, "EXPOSE"),
            DockerInstructionKind::Cmd => write!(f, "CMD"),
            DockerInstructionKind::Entrypoint => write!(f, "ENTRYPOINT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerInstruction {
    #[serde(rename = "type")]
    pub kind: DockerInstructionKind,
    pub value: String,
}

impl DockerInstruction {
    pub fn new(kind: DockerInstructionKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Dockerfile generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    pub base_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default)]
    pub commands: Vec<DockerInstruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// `generate-docker` job config (Node.js service image)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerJobConfig {
    /// Overrides the `node:<version>-alpine` base image when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    #[serde(default = "default_node_version")]
    pub node_version: String,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default = "default_node_port")]
    pub port: u16,
}

fn default_node_version() -> String {
    "20".to_string()
}

fn default_workdir() -> String {
    "/app".to_string()
}

fn default_node_port() -> u16 {
    3000
}

impl Default for DockerJobConfig {
    fn default() -> Self {
        Self {
            base_image: None,
            node_version: default_node_version(),
            workdir: default_workdir(),
            port: default_node_port(),
        }
    }
}
