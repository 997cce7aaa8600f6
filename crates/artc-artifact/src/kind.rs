//! Closed set of artifact types, lifecycle statuses and authorship

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Artifact type tag
///
/// The set is closed: every payload, schema and compiler pass is keyed by
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// High-level project plan derived from requirement documents
    ProjectPlan,
    /// Files and modules to create before any test exists
    ScaffoldPlan,
    /// Test cases and the test files that encode them
    TestPlan,
    /// Per-file implementation steps
    ImplementationPlan,
    /// Behaviour-preserving restructuring steps
    RefactorPlan,
    /// Outcome of running the locked tests
    ValidationResult,
    /// Diagnosis of a failed validation
    FailureReport,
}

impl ArtifactKind {
    /// Every kind, in workflow order
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::ProjectPlan,
        ArtifactKind::ScaffoldPlan,
        ArtifactKind::TestPlan,
        ArtifactKind::ImplementationPlan,
        ArtifactKind::RefactorPlan,
        ArtifactKind::ValidationResult,
        ArtifactKind::FailureReport,
    ];

    /// Stable snake_case name used for storage directories and schema files
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ProjectPlan => "project_plan",
            ArtifactKind::ScaffoldPlan => "scaffold_plan",
            ArtifactKind::TestPlan => "test_plan",
            ArtifactKind::ImplementationPlan => "implementation_plan",
            ArtifactKind::RefactorPlan => "refactor_plan",
            ArtifactKind::ValidationResult => "validation_result",
            ArtifactKind::FailureReport => "failure_report",
        }
    }

    /// Display name as used in envelopes
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::ProjectPlan => "ProjectPlan",
            ArtifactKind::ScaffoldPlan => "ScaffoldPlan",
            ArtifactKind::TestPlan => "TestPlan",
            ArtifactKind::ImplementationPlan => "ImplementationPlan",
            ArtifactKind::RefactorPlan => "RefactorPlan",
            ArtifactKind::ValidationResult => "ValidationResult",
            ArtifactKind::FailureReport => "FailureReport",
        }
    }

    /// Only test plans may be locked
    #[inline]
    #[must_use]
    pub fn is_lockable(&self) -> bool {
        matches!(self, ArtifactKind::TestPlan)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    /// Accepts `TestPlan`, `test_plan` and `test-plan`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.name().to_lowercase() == normalized)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Unrecognized artifact type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact type: '{0}'")]
pub struct UnknownKind(pub String);

/// Lifecycle status
///
/// Ordered: `Draft < Approved < Locked`. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    /// Editable, not yet reviewed
    Draft,
    /// Reviewed by a human; immutable
    Approved,
    /// Test plan whose governed files are hash-locked
    Locked,
}

impl ArtifactStatus {
    /// Whether dependents may reference an artifact in this status
    #[inline]
    #[must_use]
    pub fn is_at_least_approved(&self) -> bool {
        *self >= ArtifactStatus::Approved
    }

    /// Upper-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Draft => "DRAFT",
            ArtifactStatus::Approved => "APPROVED",
            ArtifactStatus::Locked => "LOCKED",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(ArtifactStatus::Draft),
            "APPROVED" => Ok(ArtifactStatus::Approved),
            "LOCKED" => Ok(ArtifactStatus::Locked),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Unrecognized status name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact status: '{0}'")]
pub struct UnknownStatus(pub String);

/// Who authored an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreatedBy {
    /// Hand-written or hand-edited
    Human,
    /// Produced by a compiler pass
    Model,
}
