//! ARTC Lock Manager
//!
//! Once a test plan is locked, the files it declares are frozen by content
//! hash. Nothing in the workflow may change them; any drift is detected by
//! recomputing the hashes.
//!
//! ```text
//! lock_test_plan(id, paths) ─hash→ LockManifest ─write once→ locks/<id>.json
//! verify(manifest)          ─rehash→ VerificationReport { Modified | Deleted }
//! ensure_intact(manifest)   ─drift→ LockError::Integrity
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod atomic;
pub mod error;
pub mod manager;
pub mod manifest;

pub use atomic::{write_atomic, write_json_atomic};
pub use error::{LockError, LockResult};
pub use manager::LockManager;
pub use manifest::{Drift, FileDrift, LockManifest, VerificationReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
