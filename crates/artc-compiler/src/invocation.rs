//! Model invocation port
//!
//! The compiler only ever talks to a model through [`ModelInvocation`].
//! Provider clients live outside this workspace; [`ReplayModel`] serves
//! recorded responses for offline builds and tests.

use crate::error::TransportError;
use artc_artifact::ArtifactKind;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// One model call
#[derive(Debug, Clone, Copy)]
pub struct InvocationRequest<'a> {
    /// Pass making the call
    pub pass: ArtifactKind,
    /// Fully assembled prompt
    pub prompt: &'a str,
    /// Output schema, for providers with structured-output support
    pub schema: &'a Value,
    /// Sampling temperature, within `[0.0, 0.2]`
    pub temperature: f32,
    /// Always 1: one artifact per call
    pub max_artifacts: u8,
}

/// Port to a language model
#[async_trait::async_trait]
pub trait ModelInvocation: Send + Sync {
    /// Send one prompt and return the raw response text
    ///
    /// Implementations must not retry on behalf of the compiler.
    async fn invoke(&self, request: InvocationRequest<'_>) -> Result<String, TransportError>;
}

/// Serves recorded responses, keyed by pass
#[derive(Debug, Clone, Default)]
pub struct ReplayModel {
    responses: HashMap<ArtifactKind, String>,
    fallback: Option<String>,
}

impl ReplayModel {
    /// Answer every pass with the same response
    #[must_use]
    pub fn single(response: impl Into<String>) -> Self {
        Self {
            responses: HashMap::new(),
            fallback: Some(response.into()),
        }
    }

    /// Read one recorded response from a file
    ///
    /// # Errors
    /// IO errors reading the file
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::single(std::fs::read_to_string(path)?))
    }

    /// Record a response for one pass
    #[must_use]
    pub fn with_response(mut self, pass: ArtifactKind, response: impl Into<String>) -> Self {
        self.responses.insert(pass, response.into());
        self
    }
}

#[async_trait::async_trait]
impl ModelInvocation for ReplayModel {
    async fn invoke(&self, request: InvocationRequest<'_>) -> Result<String, TransportError> {
        self.responses
            .get(&request.pass)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| TransportError::Provider {
                provider: "replay".to_string(),
                detail: format!("no recorded response for {}", request.pass),
            })
    }
}
