//! Storage port for artifact envelopes
//!
//! The core only ever sees [`ArtifactStore`]; it never inspects which
//! adapter is behind it. Two adapters ship here:
//! - [`FileSystemStore`]: `artifacts/<kind>/<id>.json`, atomic writes
//! - [`InMemoryStore`]: for tests and dry runs
//!
//! For every adapter `load(save(e)) == e`.

mod fs;
mod memory;

pub use fs::{FileSystemStore, ARTIFACTS_DIR};
pub use memory::InMemoryStore;

use crate::error::StoreResult;
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Persistence of artifact envelopes
pub trait ArtifactStore: Send + Sync + Debug {
    /// Canonical location for an artifact
    fn path_for(&self, kind: ArtifactKind, id: ArtifactId) -> PathBuf;

    /// Write `envelope` at `path`, replacing what was there
    ///
    /// # Errors
    /// Adapter-specific write failures
    fn save(&self, envelope: &ArtifactEnvelope, path: &Path) -> StoreResult<()>;

    /// Read the envelope at `path`
    ///
    /// # Errors
    /// `NotFoundAt` or decode failures
    fn load(&self, path: &Path) -> StoreResult<ArtifactEnvelope>;

    /// Read an envelope by id
    ///
    /// # Errors
    /// `NotFound` or decode failures
    fn load_by_id(&self, id: ArtifactId) -> StoreResult<ArtifactEnvelope>;

    /// Whether an envelope with this id is stored
    fn exists(&self, id: ArtifactId) -> bool;

    /// Remove an envelope
    ///
    /// # Errors
    /// `NotFound` or adapter-specific failures
    fn delete(&self, id: ArtifactId) -> StoreResult<()>;

    /// Every stored envelope, ordered by id
    ///
    /// # Errors
    /// The first read or decode failure
    fn load_all(&self) -> StoreResult<Vec<ArtifactEnvelope>>;
}

#[cfg(test)]
mod contract_tests {
    //! Behaviour every adapter must share

    use super::*;
    use crate::error::StoreError;
    use artc_artifact::{ArtifactPayload, ArtifactStatus, CreatedBy};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn envelope(kind: ArtifactKind) -> ArtifactEnvelope {
        let payload = ArtifactPayload::new(kind, json!({"title": "t", "n": [1, 2]})).unwrap();
        ArtifactEnvelope::draft(payload, CreatedBy::Human, [])
    }

    fn exercise(store: &dyn ArtifactStore) {
        let mut plan = envelope(ArtifactKind::TestPlan);
        let path = store.path_for(plan.artifact_type(), plan.id());

        store.save(&plan, &path).unwrap();
        assert!(store.exists(plan.id()));
        assert_eq!(store.load(&path).unwrap(), plan);
        assert_eq!(store.load_by_id(plan.id()).unwrap(), plan);

        plan.transition_to(ArtifactStatus::Approved).unwrap();
        store.save(&plan, &path).unwrap();
        assert_eq!(store.load_by_id(plan.id()).unwrap().status(), ArtifactStatus::Approved);

        let other = envelope(ArtifactKind::ProjectPlan);
        store
            .save(&other, &store.path_for(other.artifact_type(), other.id()))
            .unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.windows(2).all(|w| w[0].id() < w[1].id()));

        store.delete(other.id()).unwrap();
        assert!(!store.exists(other.id()));
        assert!(matches!(store.load_by_id(other.id()), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.delete(other.id()), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn in_memory_store_contract() {
        exercise(&InMemoryStore::new());
    }

    #[test]
    fn file_system_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileSystemStore::new(dir.path()));
    }
}
