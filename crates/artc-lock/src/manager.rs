//! Lock manager
//!
//! Hashes the files a test plan declares, records them in a manifest, and
//! later recomputes the hashes to detect drift. Paths are always relative
//! to the project root; hashing streams each file through a handle that is
//! dropped before the next file is opened.

use crate::atomic::write_json_atomic;
use crate::error::{LockError, LockResult};
use crate::manifest::{Drift, FileDrift, LockManifest, VerificationReport};
use artc_artifact::{ArtifactId, ContentHash};
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Creates and verifies lock manifests
#[derive(Debug, Clone)]
pub struct LockManager {
    project_root: PathBuf,
    locks_dir: PathBuf,
}

impl LockManager {
    /// Manager for files under `project_root`, storing manifests in `locks_dir`
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, locks_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            locks_dir: locks_dir.into(),
        }
    }

    /// Project root
    #[inline]
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Manifest location for a test plan
    #[must_use]
    pub fn manifest_path(&self, test_plan_id: ArtifactId) -> PathBuf {
        self.locks_dir.join(format!("{test_plan_id}.json"))
    }

    /// Whether a manifest exists for `test_plan_id`
    #[inline]
    #[must_use]
    pub fn manifest_exists(&self, test_plan_id: ArtifactId) -> bool {
        self.manifest_path(test_plan_id).is_file()
    }

    /// Hash every declared file and write the manifest
    ///
    /// Nothing is written unless every file hashes.
    ///
    /// # Errors
    /// - `AlreadyLocked` if a manifest exists
    /// - `UnsafePath` for absolute or parent-escaping paths
    /// - `FileMissing` for the first declared file that does not exist
    /// - `Io` for read or write failures
    pub fn lock_test_plan<S: AsRef<str>>(
        &self,
        test_plan_id: ArtifactId,
        paths: &[S],
    ) -> LockResult<LockManifest> {
        if self.manifest_exists(test_plan_id) {
            return Err(LockError::AlreadyLocked { test_plan_id });
        }

        let mut files = BTreeMap::new();
        for path in paths {
            let path = path.as_ref();
            let hash = self.hash_file(path)?.ok_or_else(|| LockError::FileMissing {
                path: path.to_string(),
            })?;
            files.insert(path.to_string(), hash);
        }

        let manifest = LockManifest::new(test_plan_id, files);
        let target = self.manifest_path(test_plan_id);
        write_json_atomic(&target, &manifest).map_err(|e| LockError::io(&target, e))?;

        tracing::info!(
            test_plan = %test_plan_id,
            files = manifest.files.len(),
            "locked test plan"
        );
        Ok(manifest)
    }

    /// Recompute every hash in `manifest` and report drift
    ///
    /// Reads only; calling it twice on an unchanged tree gives the same
    /// report.
    ///
    /// # Errors
    /// `Io` for failures other than a missing file
    pub fn verify(&self, manifest: &LockManifest) -> LockResult<VerificationReport> {
        let mut drift = Vec::new();
        for (path, expected) in &manifest.files {
            match self.hash_file(path)? {
                Some(actual) if actual == *expected => {}
                Some(actual) => drift.push(FileDrift {
                    path: path.clone(),
                    drift: Drift::Modified {
                        expected: *expected,
                        actual,
                    },
                }),
                None => drift.push(FileDrift {
                    path: path.clone(),
                    drift: Drift::Deleted {
                        expected: *expected,
                    },
                }),
            }
        }

        if !drift.is_empty() {
            tracing::warn!(
                test_plan = %manifest.test_plan_id,
                drifted = drift.len(),
                "locked files drifted"
            );
        }
        Ok(VerificationReport {
            test_plan_id: manifest.test_plan_id,
            checked: manifest.files.len(),
            drift,
        })
    }

    /// Verify and turn any drift into a fatal error
    ///
    /// # Errors
    /// `Integrity` listing every drifted file, or verification IO errors
    pub fn ensure_intact(&self, manifest: &LockManifest) -> LockResult<()> {
        let report = self.verify(manifest)?;
        if report.is_intact() {
            Ok(())
        } else {
            Err(LockError::Integrity {
                test_plan_id: report.test_plan_id,
                drift: report.drift,
            })
        }
    }

    /// Load the manifest for `test_plan_id`
    ///
    /// # Errors
    /// `ManifestNotFound`, `CorruptManifest` or `Io`
    pub fn load_manifest(&self, test_plan_id: ArtifactId) -> LockResult<LockManifest> {
        let path = self.manifest_path(test_plan_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LockError::ManifestNotFound { test_plan_id })
            }
            Err(e) => return Err(LockError::io(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| LockError::CorruptManifest {
            path,
            message: e.to_string(),
        })
    }

    /// Load and verify in one step
    ///
    /// # Errors
    /// Same as [`LockManager::load_manifest`] and [`LockManager::verify`]
    pub fn verify_test_plan(&self, test_plan_id: ArtifactId) -> LockResult<VerificationReport> {
        self.verify(&self.load_manifest(test_plan_id)?)
    }

    /// Remove a manifest written by a lock that could not be completed
    ///
    /// Only the lifecycle service calls this, to undo its own write.
    ///
    /// # Errors
    /// `Io` for failures other than an already-absent file
    pub fn discard_manifest(&self, test_plan_id: ArtifactId) -> LockResult<()> {
        let path = self.manifest_path(test_plan_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!(test_plan = %test_plan_id, "discarded lock manifest");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    /// Hash of a project file; `None` if it does not exist
    fn hash_file(&self, relative: &str) -> LockResult<Option<ContentHash>> {
        let full = self.resolve(relative)?;
        let file = match std::fs::File::open(&full) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(full, e)),
        };
        ContentHash::compute_reader(file)
            .map(Some)
            .map_err(|e| LockError::io(full, e))
    }

    fn resolve(&self, relative: &str) -> LockResult<PathBuf> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(LockError::UnsafePath {
                path: relative.to_string(),
            });
        }
        Ok(self.project_root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LockManager) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::write(dir.path().join("tests/a_test.rs"), "assert a").unwrap();
        std::fs::write(dir.path().join("tests/b_test.rs"), "assert b").unwrap();
        let manager = LockManager::new(dir.path(), dir.path().join(".artc/locks"));
        (dir, manager)
    }

    #[test]
    fn lock_records_every_file() {
        let (_dir, manager) = setup();
        let id = ArtifactId::new();
        let manifest = manager
            .lock_test_plan(id, &["tests/a_test.rs", "tests/b_test.rs"])
            .unwrap();

        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files["tests/a_test.rs"], ContentHash::compute(b"assert a"));
        assert!(manager.manifest_exists(id));
        assert_eq!(manager.load_manifest(id).unwrap(), manifest);
    }

    #[test]
    fn missing_file_writes_nothing() {
        let (_dir, manager) = setup();
        let id = ArtifactId::new();
        let err = manager
            .lock_test_plan(id, &["tests/a_test.rs", "tests/nope.rs"])
            .unwrap_err();
        assert!(matches!(err, LockError::FileMissing { ref path } if path == "tests/nope.rs"));
        assert!(!manager.manifest_exists(id));
    }

    #[test]
    fn manifest_is_never_overwritten() {
        let (_dir, manager) = setup();
        let id = ArtifactId::new();
        manager.lock_test_plan(id, &["tests/a_test.rs"]).unwrap();
        assert!(matches!(
            manager.lock_test_plan(id, &["tests/b_test.rs"]),
            Err(LockError::AlreadyLocked { .. })
        ));
        assert!(manager.load_manifest(id).unwrap().governs("tests/a_test.rs"));
    }

    #[test]
    fn escaping_paths_are_refused() {
        let (_dir, manager) = setup();
        for bad in ["../outside.rs", "/etc/passwd", ""] {
            assert!(matches!(
                manager.lock_test_plan(ArtifactId::new(), &[bad]),
                Err(LockError::UnsafePath { .. })
            ));
        }
    }

    #[test]
    fn verify_reports_modified_and_deleted() {
        let (dir, manager) = setup();
        let manifest = manager
            .lock_test_plan(ArtifactId::new(), &["tests/a_test.rs", "tests/b_test.rs"])
            .unwrap();

        std::fs::write(dir.path().join("tests/a_test.rs"), "assert nothing").unwrap();
        std::fs::remove_file(dir.path().join("tests/b_test.rs")).unwrap();

        let report = manager.verify(&manifest).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.drift.len(), 2);
        assert_eq!(
            report.drift[0].drift,
            Drift::Modified {
                expected: ContentHash::compute(b"assert a"),
                actual: ContentHash::compute(b"assert nothing"),
            }
        );
        assert_eq!(
            report.drift[1].drift,
            Drift::Deleted {
                expected: ContentHash::compute(b"assert b"),
            }
        );

        // Idempotent
        assert_eq!(manager.verify(&manifest).unwrap(), report);
        assert!(manager.ensure_intact(&manifest).unwrap_err().is_integrity());
    }

    #[test]
    fn missing_manifest_is_reported() {
        let (_dir, manager) = setup();
        let id = ArtifactId::new();
        assert!(matches!(
            manager.load_manifest(id),
            Err(LockError::ManifestNotFound { test_plan_id }) if test_plan_id == id
        ));
        manager.discard_manifest(id).unwrap();
    }
}
