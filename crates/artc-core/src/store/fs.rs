//! File-system storage adapter

use super::ArtifactStore;
use crate::error::{StoreError, StoreResult};
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind};
use artc_lock::write_json_atomic;
use std::io;
use std::path::{Path, PathBuf};

/// Directory under the state dir holding envelopes
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Envelopes as pretty JSON under `<root>/artifacts/<kind>/<id>.json`
///
/// Paths handed out by [`ArtifactStore::path_for`] are relative to the
/// root, so the state directory can be moved as a whole.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    /// Store rooted at the state directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// State directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn locate(&self, id: ArtifactId) -> Option<PathBuf> {
        ArtifactKind::ALL
            .into_iter()
            .map(|kind| self.path_for(kind, id))
            .find(|path| self.resolve(path).is_file())
    }
}

impl ArtifactStore for FileSystemStore {
    fn path_for(&self, kind: ArtifactKind, id: ArtifactId) -> PathBuf {
        Path::new(ARTIFACTS_DIR)
            .join(kind.as_str())
            .join(format!("{id}.json"))
    }

    fn save(&self, envelope: &ArtifactEnvelope, path: &Path) -> StoreResult<()> {
        let full = self.resolve(path);
        write_json_atomic(&full, envelope).map_err(|e| StoreError::io(&full, e))?;
        tracing::debug!(id = %envelope.id(), path = %full.display(), "saved artifact");
        Ok(())
    }

    fn load(&self, path: &Path) -> StoreResult<ArtifactEnvelope> {
        let full = self.resolve(path);
        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFoundAt { path: full })
            }
            Err(e) => return Err(StoreError::io(full, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: full,
            message: e.to_string(),
        })
    }

    fn load_by_id(&self, id: ArtifactId) -> StoreResult<ArtifactEnvelope> {
        let path = self.locate(id).ok_or(StoreError::NotFound { id })?;
        self.load(&path)
    }

    fn exists(&self, id: ArtifactId) -> bool {
        self.locate(id).is_some()
    }

    fn delete(&self, id: ArtifactId) -> StoreResult<()> {
        let path = self.resolve(&self.locate(id).ok_or(StoreError::NotFound { id })?);
        std::fs::remove_file(&path).map_err(|e| StoreError::io(path, e))
    }

    fn load_all(&self) -> StoreResult<Vec<ArtifactEnvelope>> {
        let mut envelopes = Vec::new();
        for kind in ArtifactKind::ALL {
            let dir = self.root.join(ARTIFACTS_DIR).join(kind.as_str());
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(dir, e)),
            };
            for entry in entries {
                let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    envelopes.push(self.load(&path)?);
                }
            }
        }
        envelopes.sort_by_key(ArtifactEnvelope::id);
        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artc_artifact::{ArtifactPayload, CreatedBy};
    use serde_json::json;

    #[test]
    fn layout_is_kind_then_id() {
        let store = FileSystemStore::new("/state");
        let id = ArtifactId::new();
        assert_eq!(
            store.path_for(ArtifactKind::TestPlan, id),
            PathBuf::from(format!("artifacts/test_plan/{id}.json"))
        );
    }

    #[test]
    fn tampered_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemStore::new(dir.path());
        let envelope = ArtifactEnvelope::draft(
            ArtifactPayload::new(ArtifactKind::ProjectPlan, json!({"title": "a"})).unwrap(),
            CreatedBy::Human,
            [],
        );
        let path = store.path_for(envelope.artifact_type(), envelope.id());
        store.save(&envelope, &path).unwrap();

        let full = dir.path().join(&path);
        let text = std::fs::read_to_string(&full).unwrap().replace("\"a\"", "\"b\"");
        std::fs::write(&full, text).unwrap();

        match store.load(&path) {
            Err(StoreError::Corrupt { message, .. }) => assert!(message.contains("hash")),
            other => panic!("expected corrupt, got {other:?}"),
        }
    }
}
