//! ARTC Compiler Passes
//!
//! Treats a language model as a compiler stage: a typed context goes in,
//! exactly one schema-valid artifact comes out, or a typed rejection does.
//!
//! ```text
//! CompilerContext ─validate→ PromptManager ─assemble→ ModelInvocation
//!                                                         │ raw text
//!                                                         ↓
//!              CompilerResult ←── OutputPipeline (extract, parse, schema, code scan)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use artc_compiler::{Compiler, CompilerConfig, CompilerContext, ReplayModel};
//! use artc_artifact::ArtifactKind;
//!
//! let compiler = Compiler::builtin(CompilerConfig::default())?;
//! let context = CompilerContext::new(ArtifactKind::ProjectPlan)
//!     .with_file("docs/brief.md", brief);
//! let result = compiler
//!     .pass(ArtifactKind::ProjectPlan)
//!     .compile(&context, &ReplayModel::single(recorded))
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod compiler;
pub mod context;
pub mod error;
pub mod invocation;
pub mod language;
pub mod output;
pub mod pass;
pub mod prompt;

pub use compiler::{Compiler, CompilerConfig, CompilerPass, CompilerResult, MAX_TEMPERATURE};
pub use context::{CompilerContext, ContextArtifact};
pub use error::{
    CompileError, CompileResult, ConfigError, ContextError, ContextViolation, ErrorKind,
    OutputError, PromptError, TransportError,
};
pub use invocation::{InvocationRequest, ModelInvocation, ReplayModel};
pub use language::LanguageFamily;
pub use output::{CodeScanner, OutputPipeline};
pub use pass::{FileRequirement, ForbiddenInput, PassSpec};
pub use prompt::{PromptFragment, PromptManager, PromptSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
