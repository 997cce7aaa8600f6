//! Lifecycle service
//!
//! The only component that changes an artifact's status or payload. Each
//! operation runs under one process-local gate and commits the envelope
//! and its registry entry together: if any later step fails, earlier
//! writes are rolled back before the error is returned.
//!
//! ```text
//! create_draft ──► DRAFT ──approve──► APPROVED ──lock──► LOCKED
//!                    │  ▲                                (TestPlan only)
//!              modify└──┘ discard ──► gone
//! ```

use crate::approvals::{ApprovalLedger, ApprovalRecord, ApprovalTransition};
use crate::audit::{AuditEvent, AuditLog};
use crate::error::{LifecycleError, LifecycleResult};
use crate::registry::{ArtifactRegistry, RegistryEntry};
use crate::store::ArtifactStore;
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactPayload, ArtifactStatus, CreatedBy};
use artc_lock::{LockError, LockManager, LockManifest, VerificationReport};
use artc_schema::SchemaValidator;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Owner of every status change and payload edit
#[derive(Debug)]
pub struct LifecycleService {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<ArtifactRegistry>,
    approvals: Arc<ApprovalLedger>,
    audit: Arc<AuditLog>,
    locks: LockManager,
    validator: SchemaValidator,
    gate: Mutex<()>,
}

impl LifecycleService {
    /// Service over the given store, registry and lock manager, with an
    /// in-memory approval ledger and audit log
    #[must_use]
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<ArtifactRegistry>,
        locks: LockManager,
        validator: SchemaValidator,
    ) -> Self {
        Self {
            store,
            registry,
            approvals: Arc::new(ApprovalLedger::in_memory()),
            audit: Arc::new(AuditLog::in_memory()),
            locks,
            validator,
            gate: Mutex::new(()),
        }
    }

    /// With approval ledger
    #[must_use]
    pub fn with_approvals(mut self, approvals: Arc<ApprovalLedger>) -> Self {
        self.approvals = approvals;
        self
    }

    /// With audit log
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Artifact index
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Envelope storage
    #[inline]
    #[must_use]
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Approval ledger
    #[inline]
    #[must_use]
    pub fn approvals(&self) -> &ApprovalLedger {
        &self.approvals
    }

    /// Audit log
    #[inline]
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Lock manager
    #[inline]
    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Schema validator
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Load a registered artifact
    ///
    /// # Errors
    /// `NotFound` if unregistered, `Store` if the envelope cannot be read
    pub fn get(&self, id: ArtifactId) -> LifecycleResult<ArtifactEnvelope> {
        let entry = self.registry.lookup(id).ok_or(LifecycleError::NotFound { id })?;
        Ok(self.store.load(&entry.path)?)
    }

    /// Every registered artifact, ordered by id
    #[must_use]
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.registry.list()
    }

    /// Store a schema-valid document as a new DRAFT
    ///
    /// # Errors
    /// - `Payload` or `Schema` if the document is not a valid `kind`
    /// - registry dependency errors
    /// - `Store` or `Audit` failures; nothing is left behind
    pub fn create_draft(
        &self,
        kind: ArtifactKind,
        document: Value,
        depends_on: impl IntoIterator<Item = ArtifactId>,
        created_by: CreatedBy,
    ) -> LifecycleResult<ArtifactEnvelope> {
        self.create_recorded_draft(kind, document, depends_on, created_by, |_| None)
    }

    /// [`create_draft`](Self::create_draft), appending `follow_up`'s event
    /// before the gate is released so the new id is never observable
    /// without it
    pub(crate) fn create_recorded_draft(
        &self,
        kind: ArtifactKind,
        document: Value,
        depends_on: impl IntoIterator<Item = ArtifactId>,
        created_by: CreatedBy,
        follow_up: impl FnOnce(ArtifactId) -> Option<AuditEvent>,
    ) -> LifecycleResult<ArtifactEnvelope> {
        let payload = ArtifactPayload::new(kind, document)?;
        self.validator.validate_payload(&payload)?;
        let envelope = ArtifactEnvelope::draft(payload, created_by, depends_on);

        let _gate = self.gate.lock();
        self.commit(None, &envelope)?;
        let actor = match created_by {
            CreatedBy::Human => "human",
            CreatedBy::Model => "model",
        };
        let event = AuditEvent::Transition {
            artifact_id: envelope.id(),
            kind,
            from: None,
            to: ArtifactStatus::Draft,
            actor: actor.to_string(),
        };
        let recorded = self
            .audit
            .append(event)
            .and_then(|_| follow_up(envelope.id()).map_or(Ok(()), |event| self.audit.append(event).map(drop)));
        if let Err(e) = recorded {
            self.rollback(None, &envelope);
            return Err(e.into());
        }

        tracing::info!(id = %envelope.id(), kind = %kind, created_by = actor, "created draft");
        Ok(envelope)
    }

    /// DRAFT to APPROVED, recording who signed off
    ///
    /// # Errors
    /// - `MissingApprover` for a blank name
    /// - `InvalidTransition` unless the artifact is DRAFT
    /// - storage, registry, ledger or audit failures; the artifact stays DRAFT
    pub fn approve(&self, id: ArtifactId, approver: &str) -> LifecycleResult<ArtifactEnvelope> {
        let approver = require_approver(approver)?;
        let _gate = self.gate.lock();

        let current = self.get(id)?;
        let mut next = current.clone();
        next.transition_to(ArtifactStatus::Approved)
            .map_err(|e| LifecycleError::from_transition(id, e))?;

        self.commit(Some(&current), &next)?;
        if let Err(e) = self.record_sign_off(&current, &next, approver, ApprovalTransition::Approve) {
            self.rollback(Some(&current), &next);
            return Err(e);
        }

        tracing::info!(id = %id, kind = %next.artifact_type(), approver, "approved artifact");
        Ok(next)
    }

    /// APPROVED TestPlan to LOCKED, hashing every declared test file
    ///
    /// The manifest is written before the status changes and removed again
    /// if the status change cannot be committed.
    ///
    /// # Errors
    /// - `MissingApprover` for a blank name
    /// - `NotLockable` for anything but an APPROVED TestPlan
    /// - `Payload` if `test_files` is malformed
    /// - `Lock` for missing files, unsafe paths or an existing manifest
    /// - storage, registry, ledger or audit failures; the plan stays APPROVED
    pub fn lock(&self, id: ArtifactId, approver: &str) -> LifecycleResult<(ArtifactEnvelope, LockManifest)> {
        let approver = require_approver(approver)?;
        let _gate = self.gate.lock();

        let current = self.get(id)?;
        let mut next = current.clone();
        next.transition_to(ArtifactStatus::Locked)
            .map_err(|e| LifecycleError::from_transition(id, e))?;

        let files = current.payload().declared_test_files()?;
        let manifest = self.locks.lock_test_plan(id, &files)?;

        if let Err(e) = self.commit(Some(&current), &next) {
            self.discard_manifest(id);
            return Err(e);
        }
        if let Err(e) = self.record_sign_off(&current, &next, approver, ApprovalTransition::Lock) {
            self.rollback(Some(&current), &next);
            self.discard_manifest(id);
            return Err(e);
        }

        tracing::info!(id = %id, files = manifest.files.len(), approver, "locked test plan");
        Ok((next, manifest))
    }

    /// Replace the payload of a DRAFT
    ///
    /// # Errors
    /// - `Immutable` for APPROVED or LOCKED artifacts
    /// - `Payload` or `Schema` if the document is not valid for its type
    /// - storage, registry or audit failures; the old payload stays
    pub fn modify(&self, id: ArtifactId, document: Value) -> LifecycleResult<ArtifactEnvelope> {
        let _gate = self.gate.lock();
        let current = self.get(id)?;
        if current.status() != ArtifactStatus::Draft {
            return Err(LifecycleError::Immutable {
                id,
                status: current.status(),
            });
        }

        let payload = ArtifactPayload::new(current.artifact_type(), document)?;
        self.validator.validate_payload(&payload)?;
        let mut next = current.clone();
        next.replace_payload(payload)?;

        self.commit(Some(&current), &next)?;
        if let Err(e) = self.audit.append(AuditEvent::Modified { artifact_id: id }) {
            self.rollback(Some(&current), &next);
            return Err(e.into());
        }

        tracing::info!(id = %id, hash = %next.payload().content_hash().short(), "modified draft");
        Ok(next)
    }

    /// Remove a DRAFT and its registry entry
    ///
    /// # Errors
    /// - `Immutable` for APPROVED or LOCKED artifacts
    /// - storage, registry or audit failures; the draft stays
    pub fn discard(&self, id: ArtifactId) -> LifecycleResult<()> {
        let _gate = self.gate.lock();
        let current = self.get(id)?;
        if current.status() != ArtifactStatus::Draft {
            return Err(LifecycleError::Immutable {
                id,
                status: current.status(),
            });
        }

        let entry = self.registry.unregister(id)?;
        if let Err(e) = self.store.delete(id) {
            self.reregister(&current, entry.path);
            return Err(e.into());
        }
        if let Err(e) = self.audit.append(AuditEvent::Discarded { artifact_id: id }) {
            if let Err(restore) = self.store.save(&current, &entry.path) {
                tracing::error!(id = %id, error = %restore, "rollback failed: draft envelope lost");
            }
            self.reregister(&current, entry.path);
            return Err(e.into());
        }

        tracing::info!(id = %id, "discarded draft");
        Ok(())
    }

    /// Recompute the lock hashes of one TestPlan
    ///
    /// # Errors
    /// Manifest loading or read failures
    pub fn verify(&self, test_plan_id: ArtifactId) -> Result<VerificationReport, LockError> {
        self.locks.verify_test_plan(test_plan_id)
    }

    /// Verify every LOCKED TestPlan, failing on the first drift
    ///
    /// Returns the number of plans checked.
    ///
    /// # Errors
    /// `LockError::Integrity` for drift, or manifest failures
    pub fn ensure_locked_tests_intact(&self) -> Result<usize, LockError> {
        let locked: Vec<_> = self
            .registry
            .list_by_status(ArtifactStatus::Locked)
            .into_iter()
            .filter(|e| e.artifact_type == ArtifactKind::TestPlan)
            .collect();
        for entry in &locked {
            let manifest = self.locks.load_manifest(entry.id)?;
            self.locks.ensure_intact(&manifest)?;
        }
        Ok(locked.len())
    }

    /// Save `next`, then register it; undo the save if registration fails
    fn commit(&self, previous: Option<&ArtifactEnvelope>, next: &ArtifactEnvelope) -> LifecycleResult<PathBuf> {
        let path = self.path_of(next);
        self.store.save(next, &path)?;
        if let Err(e) = self.registry.register(next, &path) {
            match previous {
                Some(previous) => {
                    if let Err(restore) = self.store.save(previous, &path) {
                        tracing::error!(id = %next.id(), error = %restore, "rollback failed: envelope ahead of registry");
                    }
                }
                None => {
                    if let Err(restore) = self.store.delete(next.id()) {
                        tracing::error!(id = %next.id(), error = %restore, "rollback failed: orphan envelope");
                    }
                }
            }
            return Err(e.into());
        }
        Ok(path)
    }

    /// Undo a successful [`commit`](Self::commit)
    fn rollback(&self, previous: Option<&ArtifactEnvelope>, next: &ArtifactEnvelope) {
        let id = next.id();
        let path = self.path_of(next);
        let outcome = match previous {
            Some(previous) => self
                .store
                .save(previous, &path)
                .map_err(LifecycleError::from)
                .and_then(|()| self.registry.restore(previous, &path).map(drop).map_err(Into::into)),
            None => self
                .registry
                .unregister(id)
                .map(drop)
                .map_err(LifecycleError::from)
                .and_then(|()| self.store.delete(id).map_err(Into::into)),
        };
        match outcome {
            Ok(()) => tracing::warn!(id = %id, "rolled back artifact change"),
            Err(e) => tracing::error!(id = %id, error = %e, "rollback failed"),
        }
    }

    fn reregister(&self, envelope: &ArtifactEnvelope, path: PathBuf) {
        if let Err(e) = self.registry.register(envelope, &path) {
            tracing::error!(id = %envelope.id(), error = %e, "rollback failed: draft unregistered");
        }
    }

    fn discard_manifest(&self, id: ArtifactId) {
        if let Err(e) = self.locks.discard_manifest(id) {
            tracing::error!(id = %id, error = %e, "rollback failed: manifest left behind");
        }
    }

    fn record_sign_off(
        &self,
        current: &ArtifactEnvelope,
        next: &ArtifactEnvelope,
        approver: &str,
        transition: ApprovalTransition,
    ) -> LifecycleResult<()> {
        let id = next.id();
        self.approvals
            .record(ApprovalRecord::now(id, approver, transition))?;
        let event = AuditEvent::Transition {
            artifact_id: id,
            kind: next.artifact_type(),
            from: Some(current.status()),
            to: next.status(),
            actor: approver.to_string(),
        };
        if let Err(e) = self.audit.append(event) {
            if let Err(retract) = self.approvals.retract(id) {
                tracing::error!(id = %id, error = %retract, "rollback failed: approval record kept");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn path_of(&self, envelope: &ArtifactEnvelope) -> PathBuf {
        self.registry
            .lookup(envelope.id())
            .map_or_else(|| self.store.path_for(envelope.artifact_type(), envelope.id()), |e| e.path)
    }
}

fn require_approver(approver: &str) -> LifecycleResult<&str> {
    let approver = approver.trim();
    if approver.is_empty() {
        Err(LifecycleError::MissingApprover)
    } else {
        Ok(approver)
    }
}
