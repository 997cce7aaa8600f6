//! ARTC Core - registry, storage, lifecycle and builds
//!
//! Everything that persists or changes state:
//! - Stores envelopes behind the [`ArtifactStore`] port
//! - Indexes them and enforces dependency rules ([`ArtifactRegistry`])
//! - Owns every status change and payload edit ([`LifecycleService`])
//! - Records sign-offs and a hash-chained audit trail
//! - Runs compiler passes and stores accepted output as drafts
//!   ([`ArtifactBuilder`])
//!
//! # Example
//!
//! ```rust,ignore
//! use artc_core::{ArtcConfig, Workspace};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workspace = Workspace::open(ArtcConfig::discover(".")?)?;
//! let context = workspace
//!     .builder()
//!     .context_for(ArtifactKind::ScaffoldPlan, &[project_plan_id])?;
//! let outcome = workspace.builder().build(&context, &model).await?;
//!
//! if let Some(draft) = outcome.envelope() {
//!     workspace.lifecycle().approve(draft.id(), "reviewer")?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod approvals;
pub mod audit;
pub mod builder;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod store;
pub mod workspace;

pub use approvals::{ApprovalLedger, ApprovalRecord, ApprovalTransition};
pub use audit::{verify_entries, AuditEntry, AuditEvent, AuditLog, CompileOutcome};
pub use builder::{ArtifactBuilder, BuildOutcome};
pub use config::{ArtcConfig, CONFIG_FILE};
pub use error::{
    AuditError, BuildError, BuildResult, ConfigError, LifecycleError, LifecycleResult,
    RegistryError, RegistryResult, StoreError, StoreResult, WorkspaceError,
};
pub use lifecycle::LifecycleService;
pub use registry::{ArtifactRegistry, RegistryEntry};
pub use store::{ArtifactStore, FileSystemStore, InMemoryStore, ARTIFACTS_DIR};
pub use workspace::Workspace;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with ARTC Core
    pub use crate::{
        ArtcConfig, ArtifactBuilder, ArtifactRegistry, ArtifactStore, BuildOutcome,
        LifecycleService, Workspace,
    };
    pub use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactStatus, CreatedBy};
    pub use artc_compiler::{CompilerContext, ModelInvocation};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
