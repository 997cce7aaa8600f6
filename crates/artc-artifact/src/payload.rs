//! Type-tagged artifact payloads

use crate::hash::ContentHash;
use crate::kind::ArtifactKind;
use serde_json::Value;

/// Field of a test plan payload listing the files it governs
pub const TEST_FILES_FIELD: &str = "test_files";

/// Errors constructing or reading a payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Payload documents are always JSON objects
    #[error("{kind} payload must be a JSON object, got {found}")]
    NotAnObject {
        /// Payload type
        kind: ArtifactKind,
        /// JSON type found instead
        found: &'static str,
    },

    /// Operation requires a different artifact type
    #[error("expected {expected} payload, got {actual}")]
    WrongKind {
        /// Type the operation needs
        expected: ArtifactKind,
        /// Type of this payload
        actual: ArtifactKind,
    },

    /// Test plan without a usable `test_files` list
    #[error("test plan field '{field}' is malformed: {reason}")]
    MalformedTestFiles {
        /// Offending field, e.g. `test_files[2]`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Artifact payload: a type tag plus its structured document
///
/// The document is schema-validated by the caller before it is wrapped; this
/// type only guarantees the tag and the object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPayload {
    kind: ArtifactKind,
    document: Value,
}

impl ArtifactPayload {
    /// Wrap a document for the given type
    ///
    /// # Errors
    /// `NotAnObject` if `document` is not a JSON object
    pub fn new(kind: ArtifactKind, document: Value) -> Result<Self, PayloadError> {
        if !document.is_object() {
            return Err(PayloadError::NotAnObject {
                kind,
                found: json_type_name(&document),
            });
        }
        Ok(Self { kind, document })
    }

    /// Type tag
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Structured document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Take the document out
    #[inline]
    #[must_use]
    pub fn into_document(self) -> Value {
        self.document
    }

    /// Blake3 hash of the compact document encoding
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::compute_json(&self.document)
    }

    /// Paths of the test files a test plan declares, in declaration order
    ///
    /// Each entry of `test_files` is either a path string or an object with a
    /// `path` field. Duplicates are dropped.
    ///
    /// # Errors
    /// - `WrongKind` for anything but a test plan
    /// - `MalformedTestFiles` if the list is missing or an entry has no path
    pub fn declared_test_files(&self) -> Result<Vec<String>, PayloadError> {
        if self.kind != ArtifactKind::TestPlan {
            return Err(PayloadError::WrongKind {
                expected: ArtifactKind::TestPlan,
                actual: self.kind,
            });
        }
        let entries = self
            .document
            .get(TEST_FILES_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| PayloadError::MalformedTestFiles {
                field: TEST_FILES_FIELD.to_string(),
                reason: "missing or not an array".to_string(),
            })?;

        let mut paths: Vec<String> = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let path = match entry {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("path").and_then(Value::as_str),
                _ => None,
            }
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PayloadError::MalformedTestFiles {
                field: format!("{TEST_FILES_FIELD}[{i}]"),
                reason: "entry has no path".to_string(),
            })?;
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
        Ok(paths)
    }
}

/// JSON type name for diagnostics
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
