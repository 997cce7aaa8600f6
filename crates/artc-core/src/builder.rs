//! Build orchestration
//!
//! [`ArtifactBuilder`] wires a compiler pass to the lifecycle service: it
//! checks lock integrity where the pass needs it, runs the pass once,
//! records the attempt in the audit log and stores an accepted payload as
//! a model-authored DRAFT. It never approves anything.

use crate::audit::{AuditEvent, CompileOutcome};
use crate::error::{BuildError, BuildResult, LifecycleError, LifecycleResult};
use crate::lifecycle::LifecycleService;
use artc_artifact::{ArtifactEnvelope, ArtifactId, ArtifactKind, CreatedBy};
use artc_compiler::{CompileError, Compiler, CompilerContext, CompilerResult, ErrorKind, ModelInvocation};
use futures::future::join_all;
use std::sync::Arc;

/// Passes that may only run while every locked test file is intact
const INTEGRITY_GATED: [ArtifactKind; 2] = [ArtifactKind::ImplementationPlan, ArtifactKind::RefactorPlan];

/// What a build produced
#[derive(Debug)]
pub enum BuildOutcome {
    /// Payload accepted and stored as a DRAFT
    Drafted {
        /// The new draft
        envelope: ArtifactEnvelope,
        /// Response it was extracted from
        raw_response: String,
    },
    /// Context or output rejected; nothing stored
    Rejected {
        /// Pass that ran
        pass: ArtifactKind,
        /// Why
        error: CompileError,
        /// Response, when one was received
        raw_response: Option<String>,
    },
}

impl BuildOutcome {
    /// The stored draft, if any
    #[must_use]
    pub fn envelope(&self) -> Option<&ArtifactEnvelope> {
        match self {
            Self::Drafted { envelope, .. } => Some(envelope),
            Self::Rejected { .. } => None,
        }
    }

    /// Rejection reason, if any
    #[must_use]
    pub fn error(&self) -> Option<&CompileError> {
        match self {
            Self::Drafted { .. } => None,
            Self::Rejected { error, .. } => Some(error),
        }
    }
}

/// Runs compiler passes and stores their output
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    compiler: Arc<Compiler>,
    lifecycle: Arc<LifecycleService>,
}

impl ArtifactBuilder {
    /// Create builder over shared services
    #[must_use]
    pub fn new(compiler: Arc<Compiler>, lifecycle: Arc<LifecycleService>) -> Self {
        Self { compiler, lifecycle }
    }

    /// Compiler in use
    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Context for `pass` holding the given registered artifacts
    ///
    /// Project files and the target file are added by the caller.
    ///
    /// # Errors
    /// `NotFound` or storage failures for any id
    pub fn context_for(&self, pass: ArtifactKind, artifacts: &[ArtifactId]) -> LifecycleResult<CompilerContext> {
        let mut context = CompilerContext::new(pass);
        for id in artifacts {
            context.insert_artifact(&self.lifecycle.get(*id)?);
        }
        Ok(context)
    }

    /// Run the pass for `context` once
    ///
    /// The new draft depends on every artifact in the context.
    ///
    /// # Errors
    /// - `Integrity` if an implementation or refactor pass finds drift in a
    ///   locked test file; the model is not invoked
    /// - `Compile` for configuration failures (schema or prompt loading)
    /// - `Lifecycle` or `Audit` if the outcome cannot be stored; an accepted
    ///   draft whose compile entry cannot be written is removed again
    pub async fn build(&self, context: &CompilerContext, model: &dyn ModelInvocation) -> BuildResult<BuildOutcome> {
        let pass = context.pass_type();
        if INTEGRITY_GATED.contains(&pass) {
            let checked = self.lifecycle.ensure_locked_tests_intact().map_err(|e| {
                tracing::warn!(pass = %pass, error = %e, "build aborted on lock drift");
                BuildError::Integrity(e)
            })?;
            tracing::debug!(pass = %pass, plans = checked, "locked test plans intact");
        }

        match self.compiler.pass(pass).compile(context, model).await {
            CompilerResult::Success { payload, raw_response, .. } => {
                let response = raw_response.clone();
                let envelope = self
                    .lifecycle
                    .create_recorded_draft(
                        pass,
                        payload.into_document(),
                        context.artifacts().keys().copied(),
                        CreatedBy::Model,
                        |id| {
                            Some(AuditEvent::Compile {
                                pass,
                                outcome: CompileOutcome::Accepted,
                                error_kind: None,
                                artifact_id: Some(id),
                                raw_response: Some(response),
                            })
                        },
                    )
                    .map_err(|e| match e {
                        LifecycleError::Audit(e) => BuildError::Audit(e),
                        other => BuildError::Lifecycle(other),
                    })?;
                tracing::info!(pass = %pass, id = %envelope.id(), "built draft");
                Ok(BuildOutcome::Drafted { envelope, raw_response })
            }
            CompilerResult::Failure { pass, error, raw_response } => {
                self.lifecycle.audit().append(AuditEvent::Compile {
                    pass,
                    outcome: CompileOutcome::Rejected,
                    error_kind: Some(error.kind().as_str().to_string()),
                    artifact_id: None,
                    raw_response: raw_response.clone(),
                })?;
                if error.kind() == ErrorKind::Configuration {
                    return Err(error.into());
                }
                Ok(BuildOutcome::Rejected { pass, error, raw_response })
            }
        }
    }

    /// Run independent passes concurrently; results keep input order
    pub async fn build_all(
        &self,
        contexts: &[CompilerContext],
        model: &dyn ModelInvocation,
    ) -> Vec<BuildResult<BuildOutcome>> {
        join_all(contexts.iter().map(|context| self.build(context, model))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::error::AuditError;
    use crate::registry::ArtifactRegistry;
    use crate::store::{ArtifactStore, InMemoryStore};
    use artc_compiler::{CompilerConfig, ReplayModel};
    use artc_lock::LockManager;
    use artc_schema::SchemaValidator;
    use artc_test_utils::valid_document;

    #[tokio::test]
    async fn unrecorded_build_leaves_no_draft_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let lifecycle = Arc::new(
            LifecycleService::new(
                store.clone(),
                Arc::new(ArtifactRegistry::in_memory()),
                LockManager::new(dir.path(), dir.path().join("locks")),
                SchemaValidator::builtin(),
            )
            // entry 0 is the draft's creation, entry 1 the compile record
            .with_audit(Arc::new(AuditLog::failing_at(1))),
        );
        let compiler = Arc::new(Compiler::builtin(CompilerConfig::default()).unwrap());
        let builder = ArtifactBuilder::new(compiler, lifecycle.clone());

        let context = CompilerContext::new(ArtifactKind::ProjectPlan).with_file("docs/brief.md", "# Calculator");
        let model = ReplayModel::single(valid_document(ArtifactKind::ProjectPlan).to_string());

        let err = builder.build(&context, &model).await.unwrap_err();
        assert!(matches!(err, BuildError::Audit(AuditError::Io { .. })));
        assert!(lifecycle.list().is_empty());
        assert!(store.load_all().unwrap().is_empty());
    }
}
