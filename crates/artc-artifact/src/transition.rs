//! Status transition rules
//!
//! `DRAFT -> APPROVED -> LOCKED`, forward only, and only test plans reach
//! `LOCKED`.

use crate::kind::{ArtifactKind, ArtifactStatus};

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Move that is not forward along the lifecycle
    #[error("invalid transition for {kind}: {from} -> {to}")]
    Invalid {
        /// Artifact type
        kind: ArtifactKind,
        /// Current status
        from: ArtifactStatus,
        /// Requested status
        to: ArtifactStatus,
    },

    /// Lock requested for something that is not an approved test plan
    #[error("{kind} in status {status} cannot be locked")]
    NotLockable {
        /// Artifact type
        kind: ArtifactKind,
        /// Current status
        status: ArtifactStatus,
    },
}

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(kind: ArtifactKind, from: ArtifactStatus) -> &'static [ArtifactStatus] {
    match from {
        ArtifactStatus::Draft => &[ArtifactStatus::Approved],
        ArtifactStatus::Approved if kind.is_lockable() => &[ArtifactStatus::Locked],
        ArtifactStatus::Approved | ArtifactStatus::Locked => &[],
    }
}

/// Validates a status transition.
///
/// # Errors
/// - `NotLockable` when the target is `LOCKED` and the artifact is not an
///   approved test plan
/// - `Invalid` for any other move outside [`allowed_transitions`]
pub fn validate_transition(
    kind: ArtifactKind,
    from: ArtifactStatus,
    to: ArtifactStatus,
) -> Result<(), TransitionError> {
    if allowed_transitions(kind, from).contains(&to) {
        return Ok(());
    }
    if to == ArtifactStatus::Locked {
        return Err(TransitionError::NotLockable { kind, status: from });
    }
    Err(TransitionError::Invalid { kind, from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = ArtifactKind> {
        proptest::sample::select(ArtifactKind::ALL.to_vec())
    }

    fn any_status() -> impl Strategy<Value = ArtifactStatus> {
        prop_oneof![
            Just(ArtifactStatus::Draft),
            Just(ArtifactStatus::Approved),
            Just(ArtifactStatus::Locked),
        ]
    }

    #[test]
    fn draft_can_only_be_approved() {
        for kind in ArtifactKind::ALL {
            assert!(validate_transition(kind, ArtifactStatus::Draft, ArtifactStatus::Approved).is_ok());
            assert!(validate_transition(kind, ArtifactStatus::Draft, ArtifactStatus::Draft).is_err());
        }
    }

    #[test]
    fn approving_twice_is_invalid() {
        let err = validate_transition(
            ArtifactKind::ProjectPlan,
            ArtifactStatus::Approved,
            ArtifactStatus::Approved,
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { .. }));
    }

    #[test]
    fn only_approved_test_plan_locks() {
        assert!(validate_transition(
            ArtifactKind::TestPlan,
            ArtifactStatus::Approved,
            ArtifactStatus::Locked
        )
        .is_ok());
        assert!(matches!(
            validate_transition(ArtifactKind::TestPlan, ArtifactStatus::Draft, ArtifactStatus::Locked),
            Err(TransitionError::NotLockable { .. })
        ));
        assert!(matches!(
            validate_transition(
                ArtifactKind::ProjectPlan,
                ArtifactStatus::Approved,
                ArtifactStatus::Locked
            ),
            Err(TransitionError::NotLockable { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_transitions_never_move_backward(
            kind in any_kind(),
            from in any_status(),
            to in any_status(),
        ) {
            let res = validate_transition(kind, from, to);
            if res.is_ok() {
                prop_assert!(to > from);
                prop_assert!(allowed_transitions(kind, from).contains(&to));
            } else {
                prop_assert!(!allowed_transitions(kind, from).contains(&to));
            }
        }

        #[test]
        fn prop_lock_requires_test_plan(kind in any_kind(), from in any_status()) {
            let res = validate_transition(kind, from, ArtifactStatus::Locked);
            if res.is_ok() {
                prop_assert_eq!(kind, ArtifactKind::TestPlan);
                prop_assert_eq!(from, ArtifactStatus::Approved);
            } else {
                let is_not_lockable = matches!(res, Err(TransitionError::NotLockable { .. }));
                prop_assert!(is_not_lockable);
            }
        }
    }
}
