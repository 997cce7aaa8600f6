//! Lock manifests and verification reports

use artc_artifact::{ArtifactId, ContentHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hashes of every file a locked test plan governs
///
/// Written once, when the test plan is locked, and never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockManifest {
    /// Test plan that owns the lock
    pub test_plan_id: ArtifactId,
    /// When the lock was taken
    pub locked_at: DateTime<Utc>,
    /// Hash algorithm of `files`
    pub algorithm: String,
    /// Project-relative path → content hash
    pub files: BTreeMap<String, ContentHash>,
}

impl LockManifest {
    /// Manifest over already-computed hashes
    #[must_use]
    pub fn new(test_plan_id: ArtifactId, files: BTreeMap<String, ContentHash>) -> Self {
        Self {
            test_plan_id,
            locked_at: Utc::now(),
            algorithm: ContentHash::ALGORITHM.to_string(),
            files,
        }
    }

    /// Whether `path` is governed by this lock
    #[inline]
    #[must_use]
    pub fn governs(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// How a locked file differs from its recorded hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "drift", rename_all = "snake_case")]
pub enum Drift {
    /// Content changed
    Modified {
        /// Hash recorded at lock time
        expected: ContentHash,
        /// Hash now
        actual: ContentHash,
    },
    /// File no longer exists
    Deleted {
        /// Hash recorded at lock time
        expected: ContentHash,
    },
}

/// One drifted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDrift {
    /// Project-relative path
    pub path: String,
    /// What changed
    #[serde(flatten)]
    pub drift: Drift,
}

impl fmt::Display for FileDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.drift {
            Drift::Modified { expected, actual } => write!(
                f,
                "{} modified (expected {}, found {})",
                self.path,
                expected.short(),
                actual.short()
            ),
            Drift::Deleted { expected } => {
                write!(f, "{} deleted (expected {})", self.path, expected.short())
            }
        }
    }
}

/// Outcome of checking a manifest against the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// Test plan whose manifest was checked
    pub test_plan_id: ArtifactId,
    /// Number of files checked
    pub checked: usize,
    /// Every drifted file, in path order
    pub drift: Vec<FileDrift>,
}

impl VerificationReport {
    /// Whether every file still matches
    #[inline]
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.drift.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serializes_camel_case_with_hex_hashes() {
        let mut files = BTreeMap::new();
        files.insert("tests/a.rs".to_string(), ContentHash::compute(b"a"));
        let manifest = LockManifest::new(ArtifactId::new(), files);

        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("testPlanId").is_some());
        assert_eq!(json["algorithm"], "blake3");
        assert_eq!(
            json["files"]["tests/a.rs"],
            ContentHash::compute(b"a").to_string()
        );

        let back: LockManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn drift_display_names_path() {
        let drift = FileDrift {
            path: "tests/a.rs".to_string(),
            drift: Drift::Deleted {
                expected: ContentHash::compute(b"a"),
            },
        };
        assert!(drift.to_string().starts_with("tests/a.rs deleted"));
    }
}
