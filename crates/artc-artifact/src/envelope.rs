//! Artifact envelope
//!
//! The universal wrapper around every IR document: identity, type, status,
//! authorship, timestamps, dependencies and payload.
//!
//! # Invariants
//! - `id` and `created_at` never change after construction
//! - status only moves forward (see [`crate::transition`])
//! - the payload is replaceable only while the status is `DRAFT`
//! - the persisted `payloadHash` always matches the payload

use crate::hash::ContentHash;
use crate::id::ArtifactId;
use crate::kind::{ArtifactKind, ArtifactStatus, CreatedBy};
use crate::payload::{ArtifactPayload, PayloadError};
use crate::transition::{validate_transition, TransitionError};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors related to envelope operations
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Payload edits are only allowed on drafts
    #[error("artifact {id} is {status} and cannot be modified")]
    Immutable {
        /// Artifact edited
        id: ArtifactId,
        /// Its current status
        status: ArtifactStatus,
    },

    /// Replacement payload carries a different type tag
    #[error("artifact {id} is a {expected}, replacement payload is a {actual}")]
    KindMismatch {
        /// Artifact edited
        id: ArtifactId,
        /// Type of the artifact
        expected: ArtifactKind,
        /// Type tag of the replacement
        actual: ArtifactKind,
    },

    /// Stored hash does not match stored payload
    #[error("payload hash mismatch for {id}: recorded {recorded}, computed {computed}")]
    PayloadHashMismatch {
        /// Artifact loaded
        id: ArtifactId,
        /// Hash stored alongside the payload
        recorded: ContentHash,
        /// Hash of the payload as loaded
        computed: ContentHash,
    },

    /// An artifact cannot depend on itself
    #[error("artifact {0} lists itself as a dependency")]
    SelfDependency(ArtifactId),

    /// Status move rejected
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Payload shape error
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Envelope around one artifact payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeRecord", into = "EnvelopeRecord")]
pub struct ArtifactEnvelope {
    id: ArtifactId,
    status: ArtifactStatus,
    created_by: CreatedBy,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    depends_on: IndexSet<ArtifactId>,
    payload: ArtifactPayload,
}

impl ArtifactEnvelope {
    /// Create a new draft with a fresh identity
    ///
    /// Dependencies keep their first-occurrence order; repeats collapse.
    #[must_use]
    pub fn draft(
        payload: ArtifactPayload,
        created_by: CreatedBy,
        depends_on: impl IntoIterator<Item = ArtifactId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ArtifactId::new(),
            status: ArtifactStatus::Draft,
            created_by,
            created_at: now,
            updated_at: now,
            depends_on: depends_on.into_iter().collect(),
            payload,
        }
    }

    /// Identity, fixed at creation
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    /// Type tag of the payload
    #[inline]
    #[must_use]
    pub fn artifact_type(&self) -> ArtifactKind {
        self.payload.kind()
    }

    /// Lifecycle status
    #[inline]
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        self.status
    }

    /// Author
    #[inline]
    #[must_use]
    pub fn created_by(&self) -> CreatedBy {
        self.created_by
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last change
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Dependencies in declaration order
    #[inline]
    #[must_use]
    pub fn depends_on(&self) -> &IndexSet<ArtifactId> {
        &self.depends_on
    }

    /// Typed payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &ArtifactPayload {
        &self.payload
    }

    /// Move to a later status
    ///
    /// # Errors
    /// Propagates [`TransitionError`] for any move the lifecycle forbids
    pub fn transition_to(&mut self, to: ArtifactStatus) -> Result<(), TransitionError> {
        validate_transition(self.artifact_type(), self.status, to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the payload of a draft
    ///
    /// # Errors
    /// - `Immutable` unless the status is `DRAFT`
    /// - `KindMismatch` if the new payload has another type tag
    pub fn replace_payload(&mut self, payload: ArtifactPayload) -> Result<(), EnvelopeError> {
        if self.status != ArtifactStatus::Draft {
            return Err(EnvelopeError::Immutable {
                id: self.id,
                status: self.status,
            });
        }
        if payload.kind() != self.artifact_type() {
            return Err(EnvelopeError::KindMismatch {
                id: self.id,
                expected: self.artifact_type(),
                actual: payload.kind(),
            });
        }
        self.payload = payload;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Persisted shape of an envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRecord {
    id: ArtifactId,
    artifact_type: ArtifactKind,
    status: ArtifactStatus,
    created_by: CreatedBy,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    depends_on: Vec<ArtifactId>,
    payload_hash: ContentHash,
    payload: Value,
}

impl From<ArtifactEnvelope> for EnvelopeRecord {
    fn from(envelope: ArtifactEnvelope) -> Self {
        let payload_hash = envelope.payload.content_hash();
        Self {
            id: envelope.id,
            artifact_type: envelope.payload.kind(),
            status: envelope.status,
            created_by: envelope.created_by,
            created_at: envelope.created_at,
            updated_at: envelope.updated_at,
            depends_on: envelope.depends_on.into_iter().collect(),
            payload_hash,
            payload: envelope.payload.into_document(),
        }
    }
}

impl TryFrom<EnvelopeRecord> for ArtifactEnvelope {
    type Error = EnvelopeError;

    fn try_from(record: EnvelopeRecord) -> Result<Self, Self::Error> {
        let payload = ArtifactPayload::new(record.artifact_type, record.payload)?;
        let computed = payload.content_hash();
        if computed != record.payload_hash {
            return Err(EnvelopeError::PayloadHashMismatch {
                id: record.id,
                recorded: record.payload_hash,
                computed,
            });
        }
        if record.depends_on.contains(&record.id) {
            return Err(EnvelopeError::SelfDependency(record.id));
        }
        if record.status == ArtifactStatus::Locked && !record.artifact_type.is_lockable() {
            return Err(TransitionError::NotLockable {
                kind: record.artifact_type,
                status: record.status,
            }
            .into());
        }
        Ok(Self {
            id: record.id,
            status: record.status,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
            depends_on: record.depends_on.into_iter().collect(),
            payload,
        })
    }
}
