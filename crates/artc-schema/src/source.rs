//! Schema sources
//!
//! A source yields one schema document per artifact type. Sources are plain
//! loaders; caching belongs to [`crate::SchemaValidator`].

use crate::builtin::builtin_schema;
use crate::error::{SchemaError, SchemaResult};
use artc_artifact::ArtifactKind;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Loader of per-type schema documents
pub trait SchemaSource: Send + Sync + Debug {
    /// Load the schema document for `kind`
    ///
    /// # Errors
    /// Source-specific load or parse failures
    fn load(&self, kind: ArtifactKind) -> SchemaResult<Value>;
}

/// Schemas compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemas;

impl SchemaSource for BuiltinSchemas {
    fn load(&self, kind: ArtifactKind) -> SchemaResult<Value> {
        Ok(builtin_schema(kind))
    }
}

/// Schemas read from `<dir>/<kind>.schema.json`
///
/// Types without an override file fall back to the built-in schema.
#[derive(Debug, Clone)]
pub struct DirectorySchemas {
    dir: PathBuf,
}

impl DirectorySchemas {
    /// Create source rooted at `dir`
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Override file location for `kind`
    #[must_use]
    pub fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}.schema.json", kind.as_str()))
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SchemaSource for DirectorySchemas {
    fn load(&self, kind: ArtifactKind) -> SchemaResult<Value> {
        let path = self.path_for(kind);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(kind = %kind, "no schema override, using built-in");
                return Ok(builtin_schema(kind));
            }
            Err(source) => return Err(SchemaError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|e| SchemaError::InvalidDocument {
            kind,
            path,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_source_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySchemas::new(dir.path());
        let custom = json!({"type": "object", "required": ["custom"]});
        std::fs::write(
            source.path_for(ArtifactKind::ProjectPlan),
            serde_json::to_string(&custom).unwrap(),
        )
        .unwrap();

        assert_eq!(source.load(ArtifactKind::ProjectPlan).unwrap(), custom);
        assert_eq!(
            source.load(ArtifactKind::TestPlan).unwrap(),
            builtin_schema(ArtifactKind::TestPlan)
        );
    }

    #[test]
    fn directory_source_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySchemas::new(dir.path());
        std::fs::write(source.path_for(ArtifactKind::TestPlan), "{ not json").unwrap();

        let err = source.load(ArtifactKind::TestPlan).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDocument { kind: ArtifactKind::TestPlan, .. }));
    }
}
