//! Error types for compiler passes
//!
//! Three families, matching where a pass can fail:
//! - [`ContextError`]: the caller handed the pass the wrong inputs
//! - [`TransportError`]: the model could not be reached in time
//! - [`OutputError`]: the model answered, but not with one valid artifact

use crate::language::LanguageFamily;
use crate::pass::FileRequirement;
use artc_artifact::{ArtifactId, ArtifactKind, ArtifactStatus};
use artc_schema::{SchemaError, SchemaViolation};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Stable error code carried by every rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing, forbidden or unapproved input
    ContextViolation,
    /// No JSON object in the response
    NoJson,
    /// JSON present but syntactically broken
    InvalidJson,
    /// More than one artifact in one response
    MultipleArtifacts,
    /// Prose around the artifact
    ExplanatoryText,
    /// Artifact does not satisfy its schema
    SchemaViolation,
    /// Source code inside a string field
    CodeInOutput,
    /// Invocation exceeded its time ceiling
    Timeout,
    /// Provider reported a failure
    ProviderFailure,
    /// Pass or prompt configuration is unusable
    Configuration,
}

impl ErrorKind {
    /// Code as written in audit records
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ContextViolation => "CONTEXT_VIOLATION",
            ErrorKind::NoJson => "NO_JSON",
            ErrorKind::InvalidJson => "INVALID_JSON",
            ErrorKind::MultipleArtifacts => "MULTIPLE_ARTIFACTS",
            ErrorKind::ExplanatoryText => "EXPLANATORY_TEXT",
            ErrorKind::SchemaViolation => "SCHEMA_VIOLATION",
            ErrorKind::CodeInOutput => "CODE_IN_OUTPUT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ProviderFailure => "PROVIDER_FAILURE",
            ErrorKind::Configuration => "CONFIGURATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem with a compiler context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ContextViolation {
    /// A required kind of project file is absent
    MissingFile { requirement: FileRequirement },
    /// No artifact of a required type is present
    MissingArtifact { kind: ArtifactKind },
    /// The pass needs a target file and none was named
    MissingTargetFile,
    /// The target file was named but its content is not in the context
    TargetFileNotProvided { path: String },
    /// A source file was given to a pass that must not see code
    ForbiddenSourceFile { path: String, family: LanguageFamily },
    /// The target file was given to a pass that must not see it
    ForbiddenTargetFile { path: String },
    /// A context artifact has not been approved
    UnapprovedArtifact {
        id: ArtifactId,
        kind: ArtifactKind,
        status: ArtifactStatus,
    },
}

impl fmt::Display for ContextViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { requirement } => write!(f, "missing input: {requirement}"),
            Self::MissingArtifact { kind } => write!(f, "missing required artifact: {kind}"),
            Self::MissingTargetFile => f.write_str("missing target file"),
            Self::TargetFileNotProvided { path } => {
                write!(f, "target file {path} is not among the project files")
            }
            Self::ForbiddenSourceFile { path, family } => {
                write!(f, "forbidden input: {family} source file {path}")
            }
            Self::ForbiddenTargetFile { path } => write!(f, "forbidden input: target file {path}"),
            Self::UnapprovedArtifact { id, kind, status } => {
                write!(f, "artifact {id} ({kind}) is {status}, not approved")
            }
        }
    }
}

/// Context rejected before any model call
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    /// Every violation found, in a stable order
    #[error("{pass} context rejected: {}", join(.violations))]
    Violations {
        pass: ArtifactKind,
        violations: Vec<ContextViolation>,
    },

    /// Context was built for another pass
    #[error("context built for {actual} handed to the {expected} pass")]
    WrongPass {
        expected: ArtifactKind,
        actual: ArtifactKind,
    },
}

impl ContextError {
    /// Violations, if any were collected
    #[must_use]
    pub fn violations(&self) -> &[ContextViolation] {
        match self {
            Self::Violations { violations, .. } => violations,
            Self::WrongPass { .. } => &[],
        }
    }
}

/// Model could not produce a response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Invocation exceeded the configured ceiling
    #[error("model invocation timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// Provider-side failure; detail is the upstream message as received
    #[error("provider {provider} failed: {detail}")]
    Provider { provider: String, detail: String },
}

/// Model answered with something other than one valid artifact
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// No JSON object found
    #[error("response contains no JSON object")]
    NoJson,

    /// JSON found but does not parse
    #[error("invalid JSON at line {line}, column {column}: {message} (near `{snippet}`)")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
        snippet: String,
    },

    /// More than one top-level object or JSON fence
    #[error("response contains {count} artifacts, expected exactly one")]
    MultipleArtifacts { count: usize },

    /// Non-trivial prose around the artifact
    #[error("response wraps the artifact in explanatory text: {}", excerpt(.before, .after))]
    ExplanatoryText { before: String, after: String },

    /// Artifact violates its schema
    #[error("{kind} output violates its schema: {}", join(.violations))]
    SchemaViolation {
        kind: ArtifactKind,
        violations: Vec<SchemaViolation>,
    },

    /// A string field holds source code
    #[error("source code ({}) in field {path}: {signature}", family_name(.family))]
    CodeInOutput {
        path: String,
        family: Option<LanguageFamily>,
        signature: String,
    },

    /// The output schema itself could not be loaded
    #[error("output schema unavailable: {0}")]
    SchemaUnavailable(SchemaError),
}

impl OutputError {
    /// Stable code for this rejection
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoJson => ErrorKind::NoJson,
            Self::InvalidJson { .. } => ErrorKind::InvalidJson,
            Self::MultipleArtifacts { .. } => ErrorKind::MultipleArtifacts,
            Self::ExplanatoryText { .. } => ErrorKind::ExplanatoryText,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::CodeInOutput { .. } => ErrorKind::CodeInOutput,
            Self::SchemaUnavailable(_) => ErrorKind::Configuration,
        }
    }
}

impl From<SchemaError> for OutputError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Violations { kind, violations } => Self::SchemaViolation { kind, violations },
            other => Self::SchemaUnavailable(other),
        }
    }
}

/// Unusable pass configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Temperature outside the deterministic band
    #[error("temperature {0} outside [0.0, 0.2]")]
    TemperatureOutOfRange(f32),

    /// Zero timeout ceiling
    #[error("invocation timeout must be greater than zero")]
    ZeroTimeout,
}

/// Prompt fragment could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// IO error reading an override fragment
    #[error("io error reading prompt fragment {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Override fragment has no purpose text
    #[error("prompt fragment {path} has no purpose text")]
    EmptyPurpose { path: PathBuf },
}

/// Any failure of a compile call
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Bad inputs
    #[error(transparent)]
    Context(#[from] ContextError),

    /// No response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bad response
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Prompt could not be assembled
    #[error("prompt assembly failed: {0}")]
    Prompt(#[from] PromptError),

    /// Schema for the prompt could not be loaded
    #[error("schema unavailable: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration rejected at construction
    #[error("invalid pass configuration: {0}")]
    Config(#[from] ConfigError),
}

impl CompileError {
    /// Stable code for this failure
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Context(_) => ErrorKind::ContextViolation,
            Self::Transport(TransportError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Transport(TransportError::Provider { .. }) => ErrorKind::ProviderFailure,
            Self::Output(e) => e.kind(),
            Self::Prompt(_) | Self::Schema(_) | Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the model was reached and answered
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Output(e) if e.kind() != ErrorKind::Configuration)
    }
}

/// Result type alias for compile operations
pub type CompileResult<T> = Result<T, CompileError>;

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn family_name(family: &Option<LanguageFamily>) -> &'static str {
    family.map_or("fenced", |f| f.name())
}

fn excerpt(before: &str, after: &str) -> String {
    match (before.is_empty(), after.is_empty()) {
        (false, true) => format!("before: {before:?}"),
        (true, false) => format!("after: {after:?}"),
        _ => format!("before: {before:?}, after: {after:?}"),
    }
}
