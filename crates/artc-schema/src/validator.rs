//! Schema validator with an owned compiled-schema cache
//!
//! Compiled schemas are cached per artifact type in a moka cache owned by
//! the validator instance. Nothing is process-global: two validators never
//! share state, and callers inject the validator where it is needed.

use crate::error::{SchemaError, SchemaResult, SchemaViolation};
use crate::source::{BuiltinSchemas, SchemaSource};
use artc_artifact::{ArtifactKind, ArtifactPayload};
use jsonschema::{Draft, JSONSchema};
use moka::sync::Cache;
use serde_json::Value;
use std::sync::Arc;

/// A schema document together with its compiled form
pub struct CompiledSchema {
    document: Value,
    compiled: JSONSchema,
}

impl CompiledSchema {
    /// Compile `document` as a Draft 7 schema
    ///
    /// # Errors
    /// `SchemaError::Compile` if the document is not a valid schema
    pub fn compile(kind: ArtifactKind, document: Value) -> SchemaResult<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&document)
            .map_err(|e| SchemaError::Compile {
                kind,
                message: e.to_string(),
            })?;
        Ok(Self { document, compiled })
    }

    /// Source document, as handed to the model
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Every violation of `instance`, in validator order
    #[must_use]
    pub fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    SchemaViolation {
                        path: if path.is_empty() { "/".to_string() } else { path },
                        constraint: e.to_string(),
                        schema_path: e.schema_path.to_string(),
                        actual: e.instance.clone().into_owned(),
                    }
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("title", &self.document.get("title"))
            .finish_non_exhaustive()
    }
}

/// Validates payloads against their type's schema
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    source: Arc<dyn SchemaSource>,
    cache: Cache<ArtifactKind, Arc<CompiledSchema>>,
}

impl SchemaValidator {
    /// Create validator over a schema source
    #[must_use]
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self::with_source(Arc::new(source))
    }

    /// Create validator over a shared schema source
    #[must_use]
    pub fn with_source(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            cache: Cache::new(ArtifactKind::ALL.len() as u64),
        }
    }

    /// Validator over the built-in schemas
    #[inline]
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(BuiltinSchemas)
    }

    /// Compiled schema for `kind`, loading and compiling on first use
    ///
    /// # Errors
    /// Load or compile failures from the source
    pub fn schema(&self, kind: ArtifactKind) -> SchemaResult<Arc<CompiledSchema>> {
        if let Some(cached) = self.cache.get(&kind) {
            return Ok(cached);
        }

        let compiled = Arc::new(CompiledSchema::compile(kind, self.source.load(kind)?)?);
        tracing::debug!(kind = %kind, "compiled schema");
        self.cache.insert(kind, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Validate a document as a payload of `kind`
    ///
    /// All violations are collected, not only the first.
    ///
    /// # Errors
    /// - `SchemaError::Violations` listing every violation
    /// - load/compile errors for the schema itself
    pub fn validate(&self, kind: ArtifactKind, document: &Value) -> SchemaResult<()> {
        let violations = self.schema(kind)?.violations(document);
        if violations.is_empty() {
            return Ok(());
        }
        tracing::debug!(kind = %kind, count = violations.len(), "schema violations");
        Err(SchemaError::Violations { kind, violations })
    }

    /// Validate a tagged payload against its own type's schema
    ///
    /// # Errors
    /// Same as [`SchemaValidator::validate`]
    #[inline]
    pub fn validate_payload(&self, payload: &ArtifactPayload) -> SchemaResult<()> {
        self.validate(payload.kind(), payload.document())
    }

    /// Drop a cached schema so the next use reloads it
    #[inline]
    pub fn invalidate(&self, kind: ArtifactKind) {
        self.cache.invalidate(&kind);
    }

    /// Drop every cached schema
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::builtin()
    }
}
