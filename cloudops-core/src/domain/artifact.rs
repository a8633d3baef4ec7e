//! Artifact and invocation result types
//!
//! Generated files are recovered from a task's working directory and
//! classified by extension.

use serde::{Deserialize, Serialize};

/// Classification of a generated file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Terraform,
    Kubernetes,
    Docker,
    Typescript,
    Javascript,
    Json,
    Text,
}

impl ArtifactType {
    /// Classifies a file name by the text after its last `.`
    ///
    /// A name without a dot is classified by the whole name, so `Dockerfile`
    /// maps to [`ArtifactType::Docker`]. Unknown extensions map to
    /// [`ArtifactType::Text`].
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();

        match ext.as_str() {
            "tf" => ArtifactType::Terraform,
            "yaml" | "yml" => ArtifactType::Kubernetes,
            "dockerfile" => ArtifactType::Docker,
            "ts" => ArtifactType::Typescript,
            "js" => ArtifactType::Javascript,
            "json" => ArtifactType::Json,
            _ => ArtifactType::Text,
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactType::Terraform => "terraform",
            ArtifactType::Kubernetes => "kubernetes",
            ArtifactType::Docker => "docker",
            ArtifactType::Typescript => "typescript",
            ArtifactType::Javascript => "javascript",
            ArtifactType::Json => "json",
            ArtifactType::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// A generated file recovered from a task directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name relative to the task directory
    pub path: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ArtifactType,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let kind = ArtifactType::from_path(&path);
        Self {
            path,
            content: content.into(),
            kind,
        }
    }
}

/// All qualifying files recovered from one task directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub files: Vec<Artifact>,
}

impl ArtifactBundle {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// First file whose path satisfies `predicate`
    pub fn find(&self, predicate: impl Fn(&str) -> bool) -> Option<&Artifact> {
        self.files.iter().find(|f| predicate(&f.path))
    }
}

/// Outcome of one automation task execution
///
/// `success` holds when the generator exited cleanly and produced at least
/// one artifact, or when it timed out / failed but non-empty artifacts were
/// still recovered. In the latter case `error` carries a note describing the
/// partial completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactBundle>,
}

impl InvocationResult {
    /// A failed result with no artifacts
    pub fn failed(output: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
            duration_ms,
            artifacts: None,
        }
    }

    /// Files recovered by this invocation (empty when none)
    pub fn files(&self) -> &[Artifact] {
        self.artifacts
            .as_ref()
            .map(|bundle| bundle.files.as_slice())
            .unwrap_or_default()
    }

    /// First recovered file whose path satisfies `predicate`
    pub fn find_artifact(&self, predicate: impl Fn(&str) -> bool) -> Option<&Artifact> {
        self.artifacts.as_ref().and_then(|b| b.find(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_known_extensions() {
        assert_eq!(ArtifactType::from_path("main.tf"), ArtifactType::Terraform);
        assert_eq!(ArtifactType::from_path("svc.yaml"), ArtifactType::Kubernetes);
        assert_eq!(ArtifactType::from_path("ingress.YML"), ArtifactType::Kubernetes);
        assert_eq!(ArtifactType::from_path("Dockerfile"), ArtifactType::Docker);
        assert_eq!(ArtifactType::from_path("index.ts"), ArtifactType::Typescript);
        assert_eq!(ArtifactType::from_path("index.js"), ArtifactType::Javascript);
        assert_eq!(ArtifactType::from_path("package.json"), ArtifactType::Json);
    }

    #[test]
    fn test_unknown_extension_is_text() {
        assert_eq!(ArtifactType::from_path("notes.md"), ArtifactType::Text);
        assert_eq!(ArtifactType::from_path("README"), ArtifactType::Text);
    }

    #[test]
    fn test_artifact_serializes_type_field() {
        let artifact = Artifact::new("main.tf", "resource {}");
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["type"], "terraform");
        assert_eq!(value["path"], "main.tf");
    }

    #[test]
    fn test_find_artifact() {
        let result = InvocationResult {
            success: true,
            output: String::new(),
            error: None,
            duration_ms: 10,
            artifacts: Some(ArtifactBundle {
                files: vec![
                    Artifact::new("notes.md", "hello"),
                    Artifact::new("main.tf", "provider \"aws\" {}"),
                ],
            }),
        };

        let main_tf = result.find_artifact(|p| p.contains("main.tf")).unwrap();
        assert_eq!(main_tf.kind, ArtifactType::Terraform);
        assert!(result.find_artifact(|p| p.ends_with(".yaml")).is_none());
        assert_eq!(result.files().len(), 2);
    }

    #[test]
    fn test_failed_result_has_no_artifacts() {
        let result = InvocationResult::failed("", "boom", 3);
        assert!(!result.success);
        assert!(result.artifacts.is_none());
        assert!(result.files().is_empty());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
