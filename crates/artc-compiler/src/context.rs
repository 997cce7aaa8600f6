//! Compiler context: the only input a pass ever sees
//!
//! A context is built by the caller, validated against the pass's static
//! declaration, then serialised into the prompt. Payloads are copied in, so
//! a context never aliases stored artifacts.

use crate::error::{ContextError, ContextViolation};
use crate::language::{is_document, LanguageFamily};
use crate::pass::{FileRequirement, ForbiddenInput, PassSpec};
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An artifact as it appears inside a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextArtifact {
    /// Type tag
    pub artifact_type: ArtifactKind,
    /// Status at the time the context was built
    pub status: ArtifactStatus,
    /// Payload document
    pub payload: Value,
}

impl From<&ArtifactEnvelope> for ContextArtifact {
    fn from(envelope: &ArtifactEnvelope) -> Self {
        Self {
            artifact_type: envelope.artifact_type(),
            status: envelope.status(),
            payload: envelope.payload().document().clone(),
        }
    }
}

/// Typed input bundle for one pass
///
/// Files and artifacts are kept in ordered maps so serialisation, and with
/// it the assembled prompt, is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerContext {
    pass_type: ArtifactKind,
    #[serde(default)]
    project_files: BTreeMap<String, String>,
    #[serde(default)]
    artifacts: BTreeMap<ArtifactId, ContextArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_file: Option<String>,
}

impl CompilerContext {
    /// Empty context for the pass producing `pass`
    #[must_use]
    pub fn new(pass: ArtifactKind) -> Self {
        Self {
            pass_type: pass,
            project_files: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            target_file: None,
        }
    }

    /// Add a project file
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<str>, content: impl Into<String>) -> Self {
        self.insert_file(path, content);
        self
    }

    /// Add an artifact, copying its payload
    #[must_use]
    pub fn with_artifact(mut self, envelope: &ArtifactEnvelope) -> Self {
        self.insert_artifact(envelope);
        self
    }

    /// Name the target file
    #[must_use]
    pub fn with_target_file(mut self, path: impl AsRef<str>) -> Self {
        self.target_file = Some(normalize_path(path.as_ref()));
        self
    }

    /// Add a project file in place
    pub fn insert_file(&mut self, path: impl AsRef<str>, content: impl Into<String>) {
        self.project_files
            .insert(normalize_path(path.as_ref()), content.into());
    }

    /// Add an artifact in place
    pub fn insert_artifact(&mut self, envelope: &ArtifactEnvelope) {
        self.artifacts
            .insert(envelope.id(), ContextArtifact::from(envelope));
    }

    /// Pass this context was built for
    #[inline]
    #[must_use]
    pub fn pass_type(&self) -> ArtifactKind {
        self.pass_type
    }

    /// Project files, ordered by path
    #[inline]
    #[must_use]
    pub fn project_files(&self) -> &BTreeMap<String, String> {
        &self.project_files
    }

    /// Context artifacts, ordered by id
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &BTreeMap<ArtifactId, ContextArtifact> {
        &self.artifacts
    }

    /// Target file path, if named
    #[inline]
    #[must_use]
    pub fn target_file(&self) -> Option<&str> {
        self.target_file.as_deref()
    }

    /// Check this context against a pass declaration
    ///
    /// Every violation is collected; none short-circuits another.
    ///
    /// # Errors
    /// - `ContextError::WrongPass` if the context was built for another pass
    /// - `ContextError::Violations` listing every missing or leaked input
    pub fn validate(&self, spec: &PassSpec) -> Result<(), ContextError> {
        if self.pass_type != spec.output {
            return Err(ContextError::WrongPass {
                expected: spec.output,
                actual: self.pass_type,
            });
        }

        let mut violations = Vec::new();
        self.check_required_files(spec, &mut violations);
        self.check_required_artifacts(spec, &mut violations);
        self.check_forbidden_inputs(spec, &mut violations);

        for (id, artifact) in &self.artifacts {
            if !artifact.status.is_at_least_approved() {
                violations.push(ContextViolation::UnapprovedArtifact {
                    id: *id,
                    kind: artifact.artifact_type,
                    status: artifact.status,
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            tracing::warn!(pass = %spec.output, count = violations.len(), "context rejected");
            Err(ContextError::Violations {
                pass: spec.output,
                violations,
            })
        }
    }

    fn check_required_files(&self, spec: &PassSpec, out: &mut Vec<ContextViolation>) {
        for requirement in spec.required_files {
            match requirement {
                FileRequirement::Document => {
                    if !self.project_files.keys().any(is_document) {
                        out.push(ContextViolation::MissingFile {
                            requirement: *requirement,
                        });
                    }
                }
                FileRequirement::AnyProjectFile => {
                    if self.project_files.is_empty() {
                        out.push(ContextViolation::MissingFile {
                            requirement: *requirement,
                        });
                    }
                }
                FileRequirement::TargetFile => match &self.target_file {
                    None => out.push(ContextViolation::MissingTargetFile),
                    Some(path) if !self.project_files.contains_key(path) => {
                        out.push(ContextViolation::TargetFileNotProvided { path: path.clone() });
                    }
                    Some(_) => {}
                },
            }
        }
    }

    fn check_required_artifacts(&self, spec: &PassSpec, out: &mut Vec<ContextViolation>) {
        for kind in spec.required_artifacts {
            if !self.artifacts.values().any(|a| a.artifact_type == *kind) {
                out.push(ContextViolation::MissingArtifact { kind: *kind });
            }
        }
    }

    fn check_forbidden_inputs(&self, spec: &PassSpec, out: &mut Vec<ContextViolation>) {
        if spec.forbids(ForbiddenInput::SourceCode) {
            for path in self.project_files.keys() {
                if let Some(family) = LanguageFamily::from_path(path) {
                    out.push(ContextViolation::ForbiddenSourceFile {
                        path: path.clone(),
                        family,
                    });
                }
            }
        }

        if spec.forbids(ForbiddenInput::TargetFile) {
            if let Some(path) = &self.target_file {
                out.push(ContextViolation::ForbiddenTargetFile { path: path.clone() });
            }
        }
    }
}

/// Forward slashes, no leading `./`
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}
