//! Prompt construction for the generator CLI
//!
//! Terraform, Kubernetes and Docker tasks get a structured prompt built from
//! the task context. Every other kind is sent its description verbatim.

use cloudops_core::domain::task::{AutomationTask, TaskKind};
use serde_json::Value;

/// Builds the prompt sent to the generator for `task`
pub fn build_prompt(task: &AutomationTask) -> String {
    match task.kind {
        TaskKind::Terraform => terraform_prompt(&task.context),
        TaskKind::Kubernetes => kubernetes_prompt(&task.context),
        TaskKind::Docker => docker_prompt(&task.context),
        TaskKind::Ansible | TaskKind::Custom => task.description.clone(),
    }
}

fn terraform_prompt(context: &Value) -> String {
    let provider = str_at(context, &["provider"]).unwrap_or("aws");
    let region = str_at(context, &["region"]).unwrap_or("us-east-1");

    let resources = context
        .get("resources")
        .and_then(Value::as_array)
        .map(|resources| {
            resources
                .iter()
                .map(|r| {
                    format!(
                        "- {} \"{}\" with {}",
                        str_at(r, &["type"]).unwrap_or_default(),
                        str_at(r, &["name"]).unwrap_or_default(),
                        r.get("config").unwrap_or(&Value::Null)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    format!(
        "Create a file named main.tf with Terraform configuration.

Provider: {provider}
Region: {region}

Create these resources:
{resources}

Include:
- Provider block with region
- Resource blocks with proper tags (Name, ManagedBy)
- Output blocks for IDs and IPs
- Use Terraform 1.0+ syntax

Do not ask for approval - just create the file."
    )
}

/// Accepts either a stack config (`name`, `image`, ...) or a full manifest
/// (`metadata.name`, `spec.replicas`, ...)
fn kubernetes_prompt(context: &Value) -> String {
    let container = context.pointer("/spec/template/spec/containers/0");

    let name = str_at(context, &["name"])
        .or_else(|| str_at(context, &["metadata", "name"]))
        .unwrap_or("app");
    let namespace = str_at(context, &["namespace"])
        .or_else(|| str_at(context, &["metadata", "namespace"]))
        .unwrap_or("default");
    let replicas = u64_at(context, &["replicas"])
        .or_else(|| u64_at(context, &["spec", "replicas"]))
        .unwrap_or(3);
    let image = str_at(context, &["image"])
        .or_else(|| container.and_then(|c| str_at(c, &["image"])))
        .unwrap_or("nginx:latest");
    let port = u64_at(context, &["port"])
        .or_else(|| container.and_then(|c| c.pointer("/ports/0/containerPort")?.as_u64()))
        .unwrap_or(80);
    let host = str_at(context, &["host"])
        .or_else(|| context.pointer("/spec/rules/0/host").and_then(Value::as_str))
        .unwrap_or("app.example.com");

    let mut prompt = format!(
        "Create Kubernetes YAML manifests with these specifications:

Name: {name}
Namespace: {namespace}
Replicas: {replicas}
Image: {image}
Port: {port}
"
    );

    let files = match str_at(context, &["kind"]) {
        Some(kind) => {
            prompt.push_str(&format!("Kind: {kind}\n"));
            let target = if kind.eq_ignore_ascii_case("ingress") {
                format!(" for {host}")
            } else {
                String::new()
            };
            format!(
                "Create this file:\n1. {}.yaml - {kind} manifest{target}\n\nCreate only this manifest.",
                kind.to_lowercase()
            )
        }
        None => format!(
            "Create these files:
1. deployment.yaml - Deployment manifest
2. service.yaml - Service manifest (LoadBalancer)
3. ingress.yaml - Ingress manifest for {host}"
        ),
    };

    prompt.push_str(&format!(
        "
{files}

Include proper labels, selectors, and resource limits.
Do not ask for approval - just create the files."
    ));

    prompt
}

fn docker_prompt(context: &Value) -> String {
    let base = str_at(context, &["baseImage"]).unwrap_or("node:20-alpine");
    let workdir = str_at(context, &["workdir"]).unwrap_or("/app");
    let port = u64_at(context, &["port"])
        .or_else(|| context.pointer("/ports/0").and_then(Value::as_u64))
        .unwrap_or(3000);

    format!(
        "Create a file named Dockerfile with these specifications:

Base: {base}
Workdir: {workdir}
Port: {port}

Include:
- Multi-stage build if needed
- Proper COPY instructions
- EXPOSE port
- Non-root user
- Best practices

Do not ask for approval - just create the file."
    )
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    walk(value, path)?.as_str().filter(|s| !s.is_empty())
}

fn u64_at(value: &Value, path: &[&str]) -> Option<u64> {
    walk(value, path)?.as_u64().filter(|n| *n > 0)
}

fn walk<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}
