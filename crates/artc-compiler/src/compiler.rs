//! Compiler passes
//!
//! A [`Compiler`] owns the shared, injected machinery (prompt manager,
//! schema validator, output pipeline). [`Compiler::pass`] hands out a
//! [`CompilerPass`] bound to one artifact type. A pass:
//!
//! 1. validates its context against the static declaration
//! 2. assembles a deterministic prompt
//! 3. invokes the model once, under a timeout ceiling
//! 4. runs the output pipeline
//!
//! It never persists, never retries and never mutates the context.

use crate::context::CompilerContext;
use crate::error::{CompileError, ConfigError, ErrorKind, TransportError};
use crate::invocation::{InvocationRequest, ModelInvocation};
use crate::output::{OutputPipeline, DEFAULT_MAX_SURROUNDING_CHARS};
use crate::pass::PassSpec;
use crate::prompt::PromptManager;
use artc_artifact::{ArtifactKind, ArtifactPayload};
use artc_schema::SchemaValidator;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound of the deterministic temperature band
pub const MAX_TEMPERATURE: f32 = 0.2;

/// Artifacts requested per invocation
pub const MAX_ARTIFACTS_PER_CALL: u8 = 1;

/// Settings shared by every pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Sampling temperature, within `[0.0, 0.2]`
    pub temperature: f32,
    /// Ceiling for one model invocation
    #[serde(with = "duration_millis", rename = "invocation_timeout_ms")]
    pub invocation_timeout: Duration,
    /// Allowed non-whitespace characters around the artifact
    pub max_surrounding_chars: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            invocation_timeout: Duration::from_secs(120),
            max_surrounding_chars: DEFAULT_MAX_SURROUNDING_CHARS,
        }
    }
}

impl CompilerConfig {
    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Set the lead-in/trailer allowance
    #[must_use]
    pub fn with_max_surrounding_chars(mut self, max: usize) -> Self {
        self.max_surrounding_chars = max;
        self
    }

    /// Check ranges
    ///
    /// # Errors
    /// `ConfigError` for a temperature outside the band or a zero timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.temperature));
        }
        if self.invocation_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Outcome of one compile call
#[derive(Debug)]
pub enum CompilerResult {
    /// Validated artifact, plus the response it came from
    Success {
        /// Pass that ran
        pass: ArtifactKind,
        /// Schema-valid payload
        payload: ArtifactPayload,
        /// Model response, kept for audit
        raw_response: String,
    },
    /// Rejection, with the response when one was received
    Failure {
        /// Pass that ran
        pass: ArtifactKind,
        /// Why the pass failed
        error: CompileError,
        /// Model response; `None` when the model was never reached
        raw_response: Option<String>,
    },
}

impl CompilerResult {
    /// Pass that produced this result
    #[must_use]
    pub fn pass(&self) -> ArtifactKind {
        match self {
            Self::Success { pass, .. } | Self::Failure { pass, .. } => *pass,
        }
    }

    /// Whether the pass produced an artifact
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code of a failure
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error.kind()),
        }
    }

    /// Validated payload of a success
    #[must_use]
    pub fn payload(&self) -> Option<&ArtifactPayload> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// Raw model response, if one was received
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Success { raw_response, .. } => Some(raw_response),
            Self::Failure { raw_response, .. } => raw_response.as_deref(),
        }
    }

    /// Convert into a plain `Result`, dropping the raw response
    ///
    /// # Errors
    /// The failure's `CompileError`
    pub fn into_result(self) -> Result<ArtifactPayload, CompileError> {
        match self {
            Self::Success { payload, .. } => Ok(payload),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// Shared compiler machinery
#[derive(Debug, Clone)]
pub struct Compiler {
    prompts: PromptManager,
    pipeline: OutputPipeline,
    config: CompilerConfig,
}

impl Compiler {
    /// Create compiler from injected parts
    ///
    /// # Errors
    /// `CompileError::Config` if `config` is out of range
    pub fn new(
        prompts: PromptManager,
        validator: SchemaValidator,
        config: CompilerConfig,
    ) -> Result<Self, CompileError> {
        config.validate()?;
        let pipeline =
            OutputPipeline::new(validator).with_max_surrounding_chars(config.max_surrounding_chars);
        Ok(Self {
            prompts,
            pipeline,
            config,
        })
    }

    /// Compiler with built-in prompts and schemas
    ///
    /// # Errors
    /// Same as [`Compiler::new`]
    pub fn builtin(config: CompilerConfig) -> Result<Self, CompileError> {
        Self::new(PromptManager::builtin(), SchemaValidator::builtin(), config)
    }

    /// Pass producing `kind`
    #[must_use]
    pub fn pass(&self, kind: ArtifactKind) -> CompilerPass<'_> {
        CompilerPass {
            spec: PassSpec::for_kind(kind),
            compiler: self,
        }
    }

    /// Output pipeline in use
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &OutputPipeline {
        &self.pipeline
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }
}

/// One pass, bound to its declaration
#[derive(Debug, Clone, Copy)]
pub struct CompilerPass<'a> {
    spec: &'static PassSpec,
    compiler: &'a Compiler,
}

impl CompilerPass<'_> {
    /// Static declaration
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &'static PassSpec {
        self.spec
    }

    /// Validate `context` and assemble its prompt
    ///
    /// # Errors
    /// Context violations, or schema/prompt loading failures
    pub fn prepare(&self, context: &CompilerContext) -> Result<String, CompileError> {
        context.validate(self.spec)?;
        let schema = self.compiler.pipeline.validator().schema(self.spec.output)?;
        Ok(self.compiler.prompts.assemble(context, schema.document())?)
    }

    /// Run the pass once
    pub async fn compile(
        &self,
        context: &CompilerContext,
        model: &dyn ModelInvocation,
    ) -> CompilerResult {
        let pass = self.spec.output;
        tracing::info!(pass = %pass, "compiling");

        let raw = match self.invoke(context, model).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(pass = %pass, kind = %error.kind(), error = %error, "pass failed before output");
                return CompilerResult::Failure {
                    pass,
                    error,
                    raw_response: None,
                };
            }
        };

        match self.compiler.pipeline.process(pass, &raw) {
            Ok(payload) => {
                tracing::info!(pass = %pass, hash = %payload.content_hash().short(), "artifact accepted");
                CompilerResult::Success {
                    pass,
                    payload,
                    raw_response: raw,
                }
            }
            Err(error) => {
                let error = CompileError::from(error);
                tracing::warn!(pass = %pass, kind = %error.kind(), error = %error, "output rejected");
                CompilerResult::Failure {
                    pass,
                    error,
                    raw_response: Some(raw),
                }
            }
        }
    }

    async fn invoke(
        &self,
        context: &CompilerContext,
        model: &dyn ModelInvocation,
    ) -> Result<String, CompileError> {
        let prompt = self.prepare(context)?;
        let schema = self.compiler.pipeline.validator().schema(self.spec.output)?;
        let config = &self.compiler.config;

        let request = InvocationRequest {
            pass: self.spec.output,
            prompt: &prompt,
            schema: schema.document(),
            temperature: config.temperature,
            max_artifacts: MAX_ARTIFACTS_PER_CALL,
        };

        match tokio::time::timeout(config.invocation_timeout, model.invoke(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Timeout {
                after: config.invocation_timeout,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputError;
    use crate::invocation::ReplayModel;
    use artc_artifact::{ArtifactEnvelope, ArtifactStatus, CreatedBy};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROJECT_PLAN: &str = r#"{
        "title": "Notes CLI",
        "summary": "Command-line note taking",
        "goals": ["Capture notes quickly"],
        "milestones": [{"name": "M1", "description": "Store notes on disk"}]
    }"#;

    fn compiler() -> Compiler {
        Compiler::builtin(CompilerConfig::default()).unwrap()
    }

    fn project_context() -> CompilerContext {
        CompilerContext::new(ArtifactKind::ProjectPlan).with_file("docs/brief.md", "A notes tool.")
    }

    struct CountingModel {
        calls: AtomicUsize,
        inner: ReplayModel,
    }

    #[async_trait::async_trait]
    impl ModelInvocation for CountingModel {
        async fn invoke(&self, request: InvocationRequest<'_>) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.max_artifacts, 1);
            self.inner.invoke(request).await
        }
    }

    struct SlowModel;

    #[async_trait::async_trait]
    impl ModelInvocation for SlowModel {
        async fn invoke(&self, _request: InvocationRequest<'_>) -> Result<String, TransportError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    #[test]
    fn temperature_band_is_enforced() {
        for bad in [-0.1, 0.21, 1.0] {
            let err = Compiler::builtin(CompilerConfig::default().with_temperature(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        assert!(Compiler::builtin(CompilerConfig::default().with_temperature(0.2)).is_ok());
        assert!(Compiler::builtin(CompilerConfig::default().with_timeout(Duration::ZERO)).is_err());
    }

    #[tokio::test]
    async fn success_carries_payload_and_raw_response() {
        let compiler = compiler();
        let model = ReplayModel::single(PROJECT_PLAN);
        let result = compiler
            .pass(ArtifactKind::ProjectPlan)
            .compile(&project_context(), &model)
            .await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.payload().unwrap().document()["title"], "Notes CLI");
        assert_eq!(result.raw_response(), Some(PROJECT_PLAN));
    }

    #[tokio::test]
    async fn context_violation_skips_model() {
        let compiler = compiler();
        let model = CountingModel {
            calls: AtomicUsize::new(0),
            inner: ReplayModel::single(PROJECT_PLAN),
        };
        let context = project_context().with_file("src/main.rs", "fn main() {}");

        let result = compiler.pass(ArtifactKind::ProjectPlan).compile(&context, &model).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ContextViolation));
        assert_eq!(result.raw_response(), None);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_keeps_raw_response_and_calls_once() {
        let compiler = compiler();
        let raw = format!("{PROJECT_PLAN}{PROJECT_PLAN}");
        let model = CountingModel {
            calls: AtomicUsize::new(0),
            inner: ReplayModel::single(raw.clone()),
        };

        let result = compiler
            .pass(ArtifactKind::ProjectPlan)
            .compile(&project_context(), &model)
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::MultipleArtifacts));
        assert_eq!(result.raw_response(), Some(raw.as_str()));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.into_result(),
            Err(CompileError::Output(OutputError::MultipleArtifacts { count: 2 }))
        ));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let compiler =
            Compiler::builtin(CompilerConfig::default().with_timeout(Duration::from_millis(50))).unwrap();
        let result = compiler
            .pass(ArtifactKind::ProjectPlan)
            .compile(&project_context(), &SlowModel)
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn context_is_left_untouched() {
        let compiler = compiler();
        let mut plan = ArtifactEnvelope::draft(
            ArtifactPayload::new(ArtifactKind::ProjectPlan, serde_json::from_str(PROJECT_PLAN).unwrap())
                .unwrap(),
            CreatedBy::Human,
            [],
        );
        plan.transition_to(ArtifactStatus::Approved).unwrap();
        let context = CompilerContext::new(ArtifactKind::ScaffoldPlan).with_artifact(&plan);
        let before = context.clone();

        let model = ReplayModel::single(
            json!({"modules": [{"path": "src", "kind": "directory", "purpose": "sources"}]}).to_string(),
        );
        let result = compiler.pass(ArtifactKind::ScaffoldPlan).compile(&context, &model).await;
        assert!(result.is_success(), "{result:?}");
        assert_eq!(context, before);
    }
}
