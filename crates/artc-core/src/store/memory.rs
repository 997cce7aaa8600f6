//! In-memory storage adapter

use super::ArtifactStore;
use crate::error::{StoreError, StoreResult};
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Envelopes held as serialized JSON, keyed by id
///
/// Every save encodes and every load decodes, so the payload hash is
/// checked exactly as the file store checks it. Paths are accepted for
/// interface parity and recorded, but lookups go by id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    envelopes: RwLock<BTreeMap<ArtifactId, (PathBuf, Vec<u8>)>>,
}

impl InMemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored envelopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.envelopes.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.envelopes.read().is_empty()
    }
}

fn decode(path: &Path, bytes: &[u8]) -> StoreResult<ArtifactEnvelope> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl ArtifactStore for InMemoryStore {
    fn path_for(&self, kind: ArtifactKind, id: ArtifactId) -> PathBuf {
        PathBuf::from(format!("memory/{}/{id}", kind.as_str()))
    }

    fn save(&self, envelope: &ArtifactEnvelope, path: &Path) -> StoreResult<()> {
        let bytes = serde_json::to_vec(envelope).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.envelopes
            .write()
            .insert(envelope.id(), (path.to_path_buf(), bytes));
        Ok(())
    }

    fn load(&self, path: &Path) -> StoreResult<ArtifactEnvelope> {
        let envelopes = self.envelopes.read();
        let (stored, bytes) = envelopes
            .values()
            .find(|(stored, _)| stored == path)
            .ok_or_else(|| StoreError::NotFoundAt {
                path: path.to_path_buf(),
            })?;
        decode(stored, bytes)
    }

    fn load_by_id(&self, id: ArtifactId) -> StoreResult<ArtifactEnvelope> {
        let envelopes = self.envelopes.read();
        let (path, bytes) = envelopes.get(&id).ok_or(StoreError::NotFound { id })?;
        decode(path, bytes)
    }

    fn exists(&self, id: ArtifactId) -> bool {
        self.envelopes.read().contains_key(&id)
    }

    fn delete(&self, id: ArtifactId) -> StoreResult<()> {
        self.envelopes
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { id })
    }

    fn load_all(&self) -> StoreResult<Vec<ArtifactEnvelope>> {
        self.envelopes
            .read()
            .values()
            .map(|(path, bytes)| decode(path, bytes))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artc_artifact::{ArtifactPayload, ArtifactStatus, CreatedBy};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn saved_envelope_loads_back_equal() {
        let store = InMemoryStore::new();
        let payload = ArtifactPayload::new(ArtifactKind::ProjectPlan, json!({"title": "x"})).unwrap();
        let mut envelope = ArtifactEnvelope::draft(payload, CreatedBy::Human, []);
        envelope.transition_to(ArtifactStatus::Approved).unwrap();
        let path = store.path_for(envelope.artifact_type(), envelope.id());

        store.save(&envelope, &path).unwrap();
        assert_eq!(store.load(&path).unwrap(), envelope);
        assert_eq!(store.load_by_id(envelope.id()).unwrap(), envelope);
        assert_eq!(store.load_all().unwrap(), vec![envelope]);
    }

    #[test]
    fn tampered_bytes_are_corrupt() {
        let store = InMemoryStore::new();
        let payload = ArtifactPayload::new(ArtifactKind::ProjectPlan, json!({"title": "x"})).unwrap();
        let envelope = ArtifactEnvelope::draft(payload, CreatedBy::Human, []);
        let path = store.path_for(envelope.artifact_type(), envelope.id());
        store.save(&envelope, &path).unwrap();

        {
            let mut envelopes = store.envelopes.write();
            let (_, bytes) = envelopes.get_mut(&envelope.id()).unwrap();
            let text = String::from_utf8(bytes.clone()).unwrap().replace("\"x\"", "\"y\"");
            *bytes = text.into_bytes();
        }
        assert!(matches!(store.load_by_id(envelope.id()), Err(StoreError::Corrupt { .. })));
    }
}
