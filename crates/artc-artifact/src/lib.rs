//! ARTC Artifact Model
//!
//! Typed, schema-addressable artifacts: the single intermediate
//! representation of the workflow.
//!
//! # Core Concepts
//!
//! - [`ArtifactEnvelope`]: identity, type, status, dependencies and payload
//! - [`ArtifactKind`]: closed set of artifact types
//! - [`ArtifactStatus`]: `DRAFT -> APPROVED -> LOCKED`, forward only
//! - [`ArtifactPayload`]: type tag plus structured JSON document
//! - [`ContentHash`]: 32-byte Blake3 hash for payloads and locked files
//!
//! # Example
//!
//! ```rust,ignore
//! use artc_artifact::{ArtifactEnvelope, ArtifactKind, ArtifactPayload, CreatedBy};
//!
//! let payload = ArtifactPayload::new(ArtifactKind::ProjectPlan, document)?;
//! let mut envelope = ArtifactEnvelope::draft(payload, CreatedBy::Human, []);
//! envelope.transition_to(ArtifactStatus::Approved)?;
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod envelope;
mod hash;
mod id;
mod kind;
mod payload;
pub mod transition;

pub use envelope::{ArtifactEnvelope, EnvelopeError};
pub use hash::{ContentHash, HashError};
pub use id::ArtifactId;
pub use kind::{ArtifactKind, ArtifactStatus, CreatedBy, UnknownKind, UnknownStatus};
pub use payload::{json_type_name, ArtifactPayload, PayloadError, TEST_FILES_FIELD};
pub use transition::{allowed_transitions, validate_transition, TransitionError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_test_plan_lifecycle() {
        let payload = ArtifactPayload::new(
            ArtifactKind::TestPlan,
            json!({"test_files": [{"path": "tests/a_test"}]}),
        )
        .unwrap();
        let mut env = ArtifactEnvelope::draft(payload, CreatedBy::Model, []);

        env.transition_to(ArtifactStatus::Approved).unwrap();
        env.transition_to(ArtifactStatus::Locked).unwrap();
        assert_eq!(env.status(), ArtifactStatus::Locked);

        // No way back
        assert!(env.transition_to(ArtifactStatus::Approved).is_err());
        assert!(env.transition_to(ArtifactStatus::Draft).is_err());
        assert_eq!(env.payload().declared_test_files().unwrap(), vec!["tests/a_test"]);
    }
}
