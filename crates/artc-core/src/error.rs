//! Error types for ARTC core services
//!
//! One enum per concern:
//! - [`StoreError`]: reading and writing envelopes
//! - [`RegistryError`]: dependency and status rules of the index
//! - [`LifecycleError`]: status transitions and mutations
//! - [`AuditError`]: the hash-chained audit log
//! - [`BuildError`]: build orchestration
//! - [`ConfigError`]: configuration loading

use artc_artifact::{ArtifactId, ArtifactKind, ArtifactStatus, EnvelopeError, PayloadError, TransitionError};
use artc_compiler::CompileError;
use artc_lock::LockError;
use artc_schema::SchemaError;
use std::path::PathBuf;

/// Storage adapter errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No stored envelope with this id
    #[error("artifact {id} not found in store")]
    NotFound {
        /// Requested id
        id: ArtifactId,
    },

    /// Nothing stored at this path
    #[error("no artifact stored at {path}")]
    NotFoundAt {
        /// Requested location
        path: PathBuf,
    },

    /// Stored envelope does not decode (includes payload hash mismatches)
    #[error("stored artifact at {path} is corrupt: {message}")]
    Corrupt {
        /// File read
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// IO error
    #[error("io error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Registry rule violations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Dependency is not registered
    #[error("artifact {artifact} depends on unknown artifact {dependency}")]
    MissingDependency {
        /// Artifact being registered
        artifact: ArtifactId,
        /// Dependency not in the index
        dependency: ArtifactId,
    },

    /// Dependency is still a draft
    #[error("artifact {artifact} depends on {dependency}, which is still DRAFT")]
    UnapprovedDependency {
        /// Artifact being registered
        artifact: ArtifactId,
        /// Dependency still in DRAFT
        dependency: ArtifactId,
    },

    /// Re-registration would move the status backwards
    #[error("artifact {id} is registered as {from}; cannot register it as {to}")]
    InvalidTransition {
        /// Artifact being registered
        id: ArtifactId,
        /// Registered status
        from: ArtifactStatus,
        /// Status of the rejected envelope
        to: ArtifactStatus,
    },

    /// Only drafts may be removed
    #[error("artifact {id} is {status}; only DRAFT entries can be removed")]
    NotDraft {
        /// Artifact to remove
        id: ArtifactId,
        /// Its registered status
        status: ArtifactStatus,
    },

    /// No entry with this id
    #[error("artifact {id} is not registered")]
    NotFound {
        /// Requested id
        id: ArtifactId,
    },

    /// Index could not be read or written
    #[error("registry index: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// An entry's recorded hashes do not match the chain
    #[error("audit chain broken at entry {seq}")]
    ChainBroken {
        /// First entry that does not link
        seq: u64,
    },

    /// Entry does not decode
    #[error("audit log line {line} is corrupt: {message}")]
    Corrupt {
        /// Line number, from 1
        line: usize,
        /// Decoder message
        message: String,
    },

    /// IO error
    #[error("io error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle rule violations and failed commits
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Artifact is not known
    #[error("artifact {id} not found")]
    NotFound {
        /// Requested id
        id: ArtifactId,
    },

    /// Status move the lifecycle forbids
    #[error("invalid transition for artifact {id} ({kind}): {from} -> {to}")]
    InvalidTransition {
        /// Artifact moved
        id: ArtifactId,
        /// Its type
        kind: ArtifactKind,
        /// Current status
        from: ArtifactStatus,
        /// Requested status
        to: ArtifactStatus,
    },

    /// Mutation of an approved or locked artifact
    #[error("artifact {id} is {status} and immutable")]
    Immutable {
        /// Artifact changed
        id: ArtifactId,
        /// Its current status
        status: ArtifactStatus,
    },

    /// Lock requested for something that cannot be locked now
    #[error("artifact {id} ({kind}, {status}) cannot be locked; only APPROVED test plans lock")]
    NotLockable {
        /// Artifact to lock
        id: ArtifactId,
        /// Its type
        kind: ArtifactKind,
        /// Its current status
        status: ArtifactStatus,
    },

    /// Approver name is empty
    #[error("an approver name is required")]
    MissingApprover,

    /// Payload does not satisfy its schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Payload shape error
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Envelope rule violation
    #[error(transparent)]
    Envelope(EnvelopeError),

    /// Registry rule violation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Locking failure
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Audit failure
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl LifecycleError {
    pub(crate) fn from_transition(id: ArtifactId, err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { kind, from, to } => Self::InvalidTransition { id, kind, from, to },
            TransitionError::NotLockable { kind, status } => Self::NotLockable { id, kind, status },
        }
    }
}

impl From<EnvelopeError> for LifecycleError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Immutable { id, status } => Self::Immutable { id, status },
            other => Self::Envelope(other),
        }
    }
}

/// Result type alias for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Build orchestration failures
///
/// A model rejection is not a `BuildError`; it is a normal
/// [`crate::BuildOutcome::Rejected`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Locked test files drifted; nothing was compiled
    #[error("build aborted: {0}")]
    Integrity(#[from] LockError),

    /// Storing the new draft failed
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Recording the compile attempt failed
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Pass configuration rejected
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Result type alias for build operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config {path}: {message}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Compiler settings out of range
    #[error("invalid compiler settings: {0}")]
    Compiler(#[from] artc_compiler::ConfigError),

    /// Default approver is blank
    #[error("default approver must not be empty")]
    EmptyApprover,
}

/// Opening a workspace failed
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry problem
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Storage problem
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Audit log problem
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Compiler construction problem
    #[error(transparent)]
    Compile(#[from] CompileError),
}
