//! Error types for locking and verification

use crate::manifest::FileDrift;
use artc_artifact::ArtifactId;
use std::path::PathBuf;

/// Errors from the lock manager
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// A declared test file does not exist
    #[error("cannot lock: declared test file {path} does not exist")]
    FileMissing { path: String },

    /// Declared path escapes the project root
    #[error("declared test file {path} is not a relative path inside the project")]
    UnsafePath { path: String },

    /// A manifest already exists for this test plan
    #[error("test plan {test_plan_id} is already locked; manifests are never overwritten")]
    AlreadyLocked { test_plan_id: ArtifactId },

    /// No manifest recorded for this test plan
    #[error("no lock manifest for test plan {test_plan_id}")]
    ManifestNotFound { test_plan_id: ArtifactId },

    /// Manifest file exists but does not parse
    #[error("lock manifest {path} is corrupt: {message}")]
    CorruptManifest { path: PathBuf, message: String },

    /// Locked files drifted from their recorded hashes
    #[error("integrity violation for test plan {test_plan_id}: {} file(s) drifted ({})", .drift.len(), describe(.drift))]
    Integrity {
        test_plan_id: ArtifactId,
        drift: Vec<FileDrift>,
    },

    /// IO error
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Whether this is a hard integrity failure
    #[inline]
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe(drift: &[FileDrift]) -> String {
    drift
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for lock operations
pub type LockResult<T> = Result<T, LockError>;
