//! ARTC Schema Layer
//!
//! One JSON Schema per artifact type, loaded from a [`SchemaSource`] and
//! compiled once into a validator-owned cache.
//!
//! ```text
//! SchemaSource (builtin | directory) → SchemaValidator ─┬→ validate(kind, document)
//!                                         ↑_____________│
//!                                      moka cache (per kind)
//! ```
//!
//! Validation never stops at the first problem: a rejected document carries
//! every [`SchemaViolation`] with its path, constraint and actual value.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builtin;
pub mod error;
pub mod source;
pub mod validator;

pub use builtin::builtin_schema;
pub use error::{SchemaError, SchemaResult, SchemaViolation};
pub use source::{BuiltinSchemas, DirectorySchemas, SchemaSource};
pub use validator::{CompiledSchema, SchemaValidator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
