//! Error types for schema loading and validation

use artc_artifact::ArtifactKind;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// One schema violation
///
/// Carries enough detail to be diagnosed without re-running the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value (`/` for the document root)
    pub path: String,
    /// Constraint that failed, in words
    pub constraint: String,
    /// JSON pointer to the failing keyword inside the schema
    pub schema_path: String,
    /// The value found at `path`
    pub actual: Value,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (actual: {})", self.path, self.constraint, self.actual)
    }
}

/// Errors from schema loading and validation
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// IO error reading a schema override
    #[error("io error reading schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema file is not valid JSON
    #[error("schema for {kind} at {path} is not valid JSON: {message}")]
    InvalidDocument {
        kind: ArtifactKind,
        path: PathBuf,
        message: String,
    },

    /// Schema document does not compile
    #[error("schema for {kind} does not compile: {message}")]
    Compile { kind: ArtifactKind, message: String },

    /// Document failed validation; every violation is listed
    #[error("{kind} payload violates its schema ({} violations): {}", .violations.len(), summarize(.violations))]
    Violations {
        kind: ArtifactKind,
        violations: Vec<SchemaViolation>,
    },
}

impl SchemaError {
    /// Violations, if this is a validation failure
    #[must_use]
    pub fn violations(&self) -> &[SchemaViolation] {
        match self {
            Self::Violations { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn summarize(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
