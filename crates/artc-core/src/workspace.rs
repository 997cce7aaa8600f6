//! A configured project: every service wired to its on-disk state
//!
//! ```text
//! <project_root>/<state_dir>/
//!   artifacts/<kind>/<id>.json   envelopes
//!   registry.json                index
//!   approvals.json               sign-offs
//!   locks/<testPlanId>.json      lock manifests
//!   audit.jsonl                  hash-chained log
//! ```

use crate::approvals::ApprovalLedger;
use crate::audit::AuditLog;
use crate::builder::ArtifactBuilder;
use crate::config::ArtcConfig;
use crate::error::WorkspaceError;
use crate::lifecycle::LifecycleService;
use crate::registry::ArtifactRegistry;
use crate::store::{ArtifactStore, FileSystemStore, ARTIFACTS_DIR};
use artc_compiler::{Compiler, PromptManager};
use artc_lock::LockManager;
use artc_schema::{DirectorySchemas, SchemaValidator};
use std::sync::Arc;

/// Opened project state
#[derive(Debug, Clone)]
pub struct Workspace {
    config: ArtcConfig,
    lifecycle: Arc<LifecycleService>,
    builder: ArtifactBuilder,
}

impl Workspace {
    /// Open the state described by `config`
    ///
    /// A missing registry index is rebuilt from the stored envelopes.
    ///
    /// # Errors
    /// Invalid configuration, unreadable state files, or a stored envelope
    /// that breaks the dependency rules during a rebuild
    pub fn open(config: ArtcConfig) -> Result<Self, WorkspaceError> {
        config.validate()?;
        let state = config.state_path();

        let store: Arc<dyn ArtifactStore> = Arc::new(FileSystemStore::new(&state));
        let registry = Arc::new(ArtifactRegistry::open(config.registry_path())?);
        if !registry.is_persisted() && state.join(ARTIFACTS_DIR).is_dir() {
            let count = registry.rebuild(store.as_ref())?;
            tracing::warn!(count, "registry index missing, rebuilt from store");
        }

        let validator = match config.schema_path() {
            Some(dir) => SchemaValidator::new(DirectorySchemas::new(dir)),
            None => SchemaValidator::builtin(),
        };
        let prompts = match config.prompt_path() {
            Some(dir) => PromptManager::with_override_dir(dir),
            None => PromptManager::builtin(),
        };
        let compiler = Arc::new(Compiler::new(prompts, validator.clone(), config.compiler)?);

        let lifecycle = Arc::new(
            LifecycleService::new(
                store,
                registry,
                LockManager::new(&config.project_root, config.locks_dir()),
                validator,
            )
            .with_approvals(Arc::new(ApprovalLedger::open(config.approvals_path())?))
            .with_audit(Arc::new(AuditLog::open(config.audit_path())?)),
        );
        let builder = ArtifactBuilder::new(compiler, Arc::clone(&lifecycle));

        tracing::info!(state = %state.display(), artifacts = lifecycle.list().len(), "opened workspace");
        Ok(Self {
            config,
            lifecycle,
            builder,
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArtcConfig {
        &self.config
    }

    /// Lifecycle service
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleService {
        &self.lifecycle
    }

    /// Build orchestrator
    #[inline]
    #[must_use]
    pub fn builder(&self) -> &ArtifactBuilder {
        &self.builder
    }

    /// Compiler shared by every build
    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        self.builder.compiler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artc_artifact::{ArtifactKind, CreatedBy};
    use serde_json::json;

    fn config(root: &std::path::Path) -> ArtcConfig {
        ArtcConfig::new().with_project_root(root)
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let ws = Workspace::open(config(dir.path())).unwrap();
            let draft = ws
                .lifecycle()
                .create_draft(
                    ArtifactKind::ScaffoldPlan,
                    json!({"modules": [{"path": "src/lib.rs", "kind": "file", "purpose": "entry"}]}),
                    [],
                    CreatedBy::Human,
                )
                .unwrap();
            ws.lifecycle().approve(draft.id(), "ana").unwrap();
            draft.id()
        };

        let ws = Workspace::open(config(dir.path())).unwrap();
        assert!(ws.lifecycle().get(id).unwrap().status().is_at_least_approved());
        assert_eq!(ws.lifecycle().approvals().records_for(id).len(), 1);
        assert_eq!(ws.lifecycle().audit().verify_chain().unwrap(), 2);
    }

    #[test]
    fn missing_index_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let ws = Workspace::open(config(dir.path())).unwrap();
            ws.lifecycle()
                .create_draft(
                    ArtifactKind::ScaffoldPlan,
                    json!({"modules": [{"path": "src", "kind": "directory", "purpose": "code"}]}),
                    [],
                    CreatedBy::Human,
                )
                .unwrap()
                .id()
        };
        let cfg = config(dir.path());
        std::fs::remove_file(cfg.registry_path()).unwrap();

        let ws = Workspace::open(cfg).unwrap();
        assert_eq!(ws.lifecycle().registry().lookup(id).unwrap().artifact_type, ArtifactKind::ScaffoldPlan);
    }

    #[test]
    fn fresh_project_writes_nothing_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(config(dir.path())).unwrap();
        assert!(ws.lifecycle().list().is_empty());
        assert!(!ws.config().state_path().exists());
    }
}
