//! Artifact registry
//!
//! An index of every stored artifact, kept apart from the payloads so
//! dependency and status rules can be checked without loading documents.
//! All mutation happens under one write lock; the index file is rewritten
//! atomically after every change.

use crate::error::{RegistryError, RegistryResult, StoreError};
use crate::store::ArtifactStore;
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus};
use artc_lock::write_json_atomic;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Index record for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Artifact id
    pub id: ArtifactId,
    /// Artifact type
    pub artifact_type: ArtifactKind,
    /// Status at last registration
    pub status: ArtifactStatus,
    /// Storage location, as handed out by the store
    pub path: PathBuf,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Dependencies in declaration order
    #[serde(default)]
    pub depends_on: Vec<ArtifactId>,
}

impl RegistryEntry {
    /// Entry describing `envelope` stored at `path`
    #[must_use]
    pub fn from_envelope(envelope: &ArtifactEnvelope, path: &Path) -> Self {
        Self {
            id: envelope.id(),
            artifact_type: envelope.artifact_type(),
            status: envelope.status(),
            path: path.to_path_buf(),
            created_at: envelope.created_at(),
            depends_on: envelope.depends_on().iter().copied().collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    artifacts: Vec<RegistryEntry>,
}

/// Index of stored artifacts with dependency rules
#[derive(Debug)]
pub struct ArtifactRegistry {
    index: RwLock<BTreeMap<ArtifactId, RegistryEntry>>,
    index_path: Option<PathBuf>,
}

impl ArtifactRegistry {
    /// Registry that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            index: RwLock::new(BTreeMap::new()),
            index_path: None,
        }
    }

    /// Registry persisted at `index_path`, loading it if present
    ///
    /// # Errors
    /// `RegistryError::Store` if the file exists but cannot be read
    pub fn open(index_path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let index_path = index_path.into();
        let index = match std::fs::read(&index_path) {
            Ok(bytes) => {
                let file: IndexFile =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                        path: index_path.clone(),
                        message: e.to_string(),
                    })?;
                file.artifacts.into_iter().map(|e| (e.id, e)).collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::io(&index_path, e).into()),
        };
        Ok(Self {
            index: RwLock::new(index),
            index_path: Some(index_path),
        })
    }

    /// Whether an index file backs this registry and exists
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.index_path.as_deref().is_some_and(Path::is_file)
    }

    /// Add or replace the entry for `envelope`
    ///
    /// Every dependency must already be registered and at least APPROVED.
    /// A replacement never lowers the registered status.
    ///
    /// # Errors
    /// - `MissingDependency` for an unknown dependency
    /// - `UnapprovedDependency` for a DRAFT dependency
    /// - `InvalidTransition` if `envelope` is behind the registered status
    /// - `Store` if the index cannot be written; the index is left unchanged
    pub fn register(&self, envelope: &ArtifactEnvelope, path: &Path) -> RegistryResult<RegistryEntry> {
        let mut index = self.index.write();
        if let Some(existing) = index.get(&envelope.id()) {
            if envelope.status() < existing.status {
                return Err(RegistryError::InvalidTransition {
                    id: envelope.id(),
                    from: existing.status,
                    to: envelope.status(),
                });
            }
        }
        self.insert(&mut index, envelope, path)
    }

    /// Put back the entry of a change that is being undone
    ///
    /// Unlike [`register`](Self::register) this may lower the status. Only
    /// the lifecycle service calls it, under its gate, to revert its own
    /// commit.
    pub(crate) fn restore(&self, envelope: &ArtifactEnvelope, path: &Path) -> RegistryResult<RegistryEntry> {
        let mut index = self.index.write();
        self.insert(&mut index, envelope, path)
    }

    fn insert(
        &self,
        index: &mut BTreeMap<ArtifactId, RegistryEntry>,
        envelope: &ArtifactEnvelope,
        path: &Path,
    ) -> RegistryResult<RegistryEntry> {
        check_dependencies(index, envelope.id(), envelope.depends_on().iter().copied())?;

        let entry = RegistryEntry::from_envelope(envelope, path);
        let previous = index.insert(entry.id, entry.clone());
        if let Err(e) = self.persist(index) {
            match previous {
                Some(previous) => index.insert(previous.id, previous),
                None => index.remove(&entry.id),
            };
            return Err(e);
        }

        tracing::debug!(id = %entry.id, kind = %entry.artifact_type, status = %entry.status, "registered artifact");
        Ok(entry)
    }

    /// Entry for `id`
    #[must_use]
    pub fn lookup(&self, id: ArtifactId) -> Option<RegistryEntry> {
        self.index.read().get(&id).cloned()
    }

    /// Every entry of one type, ordered by id
    #[must_use]
    pub fn list_by_type(&self, kind: ArtifactKind) -> Vec<RegistryEntry> {
        self.filtered(|e| e.artifact_type == kind)
    }

    /// Every entry in one status, ordered by id
    #[must_use]
    pub fn list_by_status(&self, status: ArtifactStatus) -> Vec<RegistryEntry> {
        self.filtered(|e| e.status == status)
    }

    /// Every entry, ordered by id
    #[must_use]
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.filtered(|_| true)
    }

    /// Remove a DRAFT entry
    ///
    /// # Errors
    /// - `NotFound` if not registered
    /// - `NotDraft` for APPROVED or LOCKED entries
    /// - `Store` if the index cannot be written; the entry stays
    pub fn unregister(&self, id: ArtifactId) -> RegistryResult<RegistryEntry> {
        let mut index = self.index.write();
        let status = index.get(&id).ok_or(RegistryError::NotFound { id })?.status;
        if status != ArtifactStatus::Draft {
            return Err(RegistryError::NotDraft { id, status });
        }

        let removed = index.remove(&id).ok_or(RegistryError::NotFound { id })?;
        if let Err(e) = self.persist(&index) {
            index.insert(id, removed);
            return Err(e);
        }
        tracing::debug!(id = %id, "unregistered artifact");
        Ok(removed)
    }

    /// Reconstruct the index from every envelope in `store`
    ///
    /// # Errors
    /// - `Store` for read failures
    /// - dependency errors if a stored envelope references a missing or
    ///   DRAFT artifact; the old index is kept
    pub fn rebuild(&self, store: &dyn ArtifactStore) -> RegistryResult<usize> {
        let envelopes = store.load_all()?;
        let rebuilt: BTreeMap<_, _> = envelopes
            .iter()
            .map(|e| {
                let path = store.path_for(e.artifact_type(), e.id());
                (e.id(), RegistryEntry::from_envelope(e, &path))
            })
            .collect();

        for entry in rebuilt.values() {
            check_dependencies(&rebuilt, entry.id, entry.depends_on.iter().copied())?;
        }

        let mut index = self.index.write();
        self.persist(&rebuilt)?;
        *index = rebuilt;
        tracing::info!(count = index.len(), "rebuilt registry");
        Ok(index.len())
    }

    fn filtered(&self, keep: impl Fn(&RegistryEntry) -> bool) -> Vec<RegistryEntry> {
        self.index.read().values().filter(|e| keep(e)).cloned().collect()
    }

    fn persist(&self, index: &BTreeMap<ArtifactId, RegistryEntry>) -> RegistryResult<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        let file = IndexFile {
            artifacts: index.values().cloned().collect(),
        };
        write_json_atomic(path, &file).map_err(|e| StoreError::io(path, e).into())
    }
}

fn check_dependencies(
    index: &BTreeMap<ArtifactId, RegistryEntry>,
    artifact: ArtifactId,
    depends_on: impl Iterator<Item = ArtifactId>,
) -> RegistryResult<()> {
    for dependency in depends_on {
        match index.get(&dependency) {
            None => return Err(RegistryError::MissingDependency { artifact, dependency }),
            Some(dep) if dep.status == ArtifactStatus::Draft => {
                return Err(RegistryError::UnapprovedDependency { artifact, dependency })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ArtifactStore, InMemoryStore};
    use artc_artifact::{ArtifactPayload, CreatedBy};
    use serde_json::json;

    fn draft(kind: ArtifactKind, deps: &[ArtifactId]) -> ArtifactEnvelope {
        let payload = ArtifactPayload::new(kind, json!({"x": 1})).unwrap();
        ArtifactEnvelope::draft(payload, CreatedBy::Human, deps.iter().copied())
    }

    fn path(e: &ArtifactEnvelope) -> PathBuf {
        PathBuf::from(format!("{}.json", e.id()))
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let registry = ArtifactRegistry::in_memory();
        let ghost = ArtifactId::new();
        let b = draft(ArtifactKind::ScaffoldPlan, &[ghost]);
        assert!(matches!(
            registry.register(&b, &path(&b)),
            Err(RegistryError::MissingDependency { dependency, .. }) if dependency == ghost
        ));
        assert!(registry.lookup(b.id()).is_none());
    }

    #[test]
    fn draft_dependency_is_rejected_until_approved() {
        let registry = ArtifactRegistry::in_memory();
        let mut a = draft(ArtifactKind::ProjectPlan, &[]);
        registry.register(&a, &path(&a)).unwrap();

        let b = draft(ArtifactKind::ScaffoldPlan, &[a.id()]);
        assert!(matches!(
            registry.register(&b, &path(&b)),
            Err(RegistryError::UnapprovedDependency { dependency, .. }) if dependency == a.id()
        ));

        a.transition_to(ArtifactStatus::Approved).unwrap();
        registry.register(&a, &path(&a)).unwrap();
        registry.register(&b, &path(&b)).unwrap();
        assert_eq!(registry.lookup(b.id()).unwrap().depends_on, vec![a.id()]);
    }

    #[test]
    fn stale_draft_copy_cannot_demote_an_approved_entry() {
        let registry = ArtifactRegistry::in_memory();
        let stale = draft(ArtifactKind::ProjectPlan, &[]);
        registry.register(&stale, &path(&stale)).unwrap();
        let mut approved = stale.clone();
        approved.transition_to(ArtifactStatus::Approved).unwrap();
        registry.register(&approved, &path(&approved)).unwrap();
        let b = draft(ArtifactKind::ScaffoldPlan, &[approved.id()]);
        registry.register(&b, &path(&b)).unwrap();

        assert!(matches!(
            registry.register(&stale, &path(&stale)),
            Err(RegistryError::InvalidTransition {
                from: ArtifactStatus::Approved,
                to: ArtifactStatus::Draft,
                ..
            })
        ));
        assert_eq!(registry.lookup(stale.id()).unwrap().status, ArtifactStatus::Approved);

        registry.restore(&stale, &path(&stale)).unwrap();
        assert_eq!(registry.lookup(stale.id()).unwrap().status, ArtifactStatus::Draft);
    }

    #[test]
    fn listing_filters_by_type_and_status() {
        let registry = ArtifactRegistry::in_memory();
        let mut plan = draft(ArtifactKind::TestPlan, &[]);
        let project = draft(ArtifactKind::ProjectPlan, &[]);
        registry.register(&project, &path(&project)).unwrap();
        plan.transition_to(ArtifactStatus::Approved).unwrap();
        registry.register(&plan, &path(&plan)).unwrap();

        assert_eq!(registry.list_by_type(ArtifactKind::TestPlan).len(), 1);
        assert_eq!(registry.list_by_status(ArtifactStatus::Draft)[0].id, project.id());
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn only_drafts_unregister() {
        let registry = ArtifactRegistry::in_memory();
        let mut a = draft(ArtifactKind::ProjectPlan, &[]);
        registry.register(&a, &path(&a)).unwrap();
        a.transition_to(ArtifactStatus::Approved).unwrap();
        registry.register(&a, &path(&a)).unwrap();

        assert!(matches!(
            registry.unregister(a.id()),
            Err(RegistryError::NotDraft { status: ArtifactStatus::Approved, .. })
        ));

        let d = draft(ArtifactKind::ScaffoldPlan, &[]);
        registry.register(&d, &path(&d)).unwrap();
        registry.unregister(d.id()).unwrap();
        assert!(matches!(registry.unregister(d.id()), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn index_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("registry.json");
        let a = draft(ArtifactKind::ProjectPlan, &[]);
        {
            let registry = ArtifactRegistry::open(&index_path).unwrap();
            registry.register(&a, &path(&a)).unwrap();
            assert!(registry.is_persisted());
        }
        let reopened = ArtifactRegistry::open(&index_path).unwrap();
        assert_eq!(reopened.lookup(a.id()).unwrap().artifact_type, ArtifactKind::ProjectPlan);
    }

    proptest::proptest! {
        #[test]
        fn dependencies_are_always_registered_and_approved(
            ops in proptest::collection::vec((proptest::bool::ANY, proptest::collection::vec(0usize..16, 0..3)), 1..40)
        ) {
            let registry = ArtifactRegistry::in_memory();
            let mut known: Vec<ArtifactEnvelope> = Vec::new();

            for (create, picks) in ops {
                if create || known.is_empty() {
                    let deps: Vec<_> = if known.is_empty() {
                        Vec::new()
                    } else {
                        picks.iter().map(|p| known[p % known.len()].id()).collect()
                    };
                    let e = draft(ArtifactKind::ProjectPlan, &deps);
                    if registry.register(&e, &path(&e)).is_ok() {
                        known.push(e);
                    }
                } else {
                    let i = picks.first().copied().unwrap_or(0) % known.len();
                    if known[i].transition_to(ArtifactStatus::Approved).is_ok() {
                        registry.register(&known[i], &path(&known[i])).unwrap();
                    }
                }

                for entry in registry.list() {
                    for dep in &entry.depends_on {
                        let dep = registry.lookup(*dep);
                        proptest::prop_assert!(dep.is_some_and(|d| d.status.is_at_least_approved()));
                    }
                }
            }
        }
    }

    #[test]
    fn rebuild_reads_the_store() {
        let store = InMemoryStore::new();
        let mut a = draft(ArtifactKind::ProjectPlan, &[]);
        a.transition_to(ArtifactStatus::Approved).unwrap();
        let b = draft(ArtifactKind::ScaffoldPlan, &[a.id()]);
        for e in [&a, &b] {
            store.save(e, &store.path_for(e.artifact_type(), e.id())).unwrap();
        }

        let registry = ArtifactRegistry::in_memory();
        assert_eq!(registry.rebuild(&store).unwrap(), 2);
        assert_eq!(registry.lookup(b.id()).unwrap().depends_on, vec![a.id()]);
    }
}
