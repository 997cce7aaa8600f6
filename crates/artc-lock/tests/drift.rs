//! Lock, tamper, verify

use artc_artifact::ArtifactId;
use artc_lock::{Drift, LockError, LockManager};
use pretty_assertions::assert_eq;

#[test]
fn modifying_a_locked_file_is_reported_with_both_hashes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(dir.path().join("tests/a_test"), "original").unwrap();
    let manager = LockManager::new(dir.path(), dir.path().join(".artc/locks"));

    let id = ArtifactId::new();
    let manifest = manager.lock_test_plan(id, &["tests/a_test"]).unwrap();
    assert!(manager.verify_test_plan(id).unwrap().is_intact());

    std::fs::write(dir.path().join("tests/a_test"), "tampered").unwrap();

    let report = manager.verify_test_plan(id).unwrap();
    assert_eq!(report.drift.len(), 1);
    assert_eq!(report.drift[0].path, "tests/a_test");
    match &report.drift[0].drift {
        Drift::Modified { expected, actual } => {
            assert_eq!(*expected, manifest.files["tests/a_test"]);
            assert_ne!(expected, actual);
        }
        other => panic!("expected modification, got {other:?}"),
    }

    let err = manager.ensure_intact(&manifest).unwrap_err();
    assert!(matches!(err, LockError::Integrity { ref drift, .. } if drift.len() == 1));
    assert!(err.to_string().contains("tests/a_test modified"));
}

#[test]
fn restoring_content_restores_integrity() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("spec.txt"), "v1").unwrap();
    let manager = LockManager::new(dir.path(), dir.path().join("locks"));
    let manifest = manager.lock_test_plan(ArtifactId::new(), &["spec.txt"]).unwrap();

    std::fs::write(dir.path().join("spec.txt"), "v2").unwrap();
    assert!(!manager.verify(&manifest).unwrap().is_intact());

    std::fs::write(dir.path().join("spec.txt"), "v1").unwrap();
    assert!(manager.ensure_intact(&manifest).is_ok());
}
