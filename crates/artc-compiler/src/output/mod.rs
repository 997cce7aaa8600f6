//! Output pipeline
//!
//! Raw model text goes through four gates, in order:
//!
//! ```text
//! extract → parse → schema-validate → code scan → ArtifactPayload
//! ```
//!
//! The first gate that fails decides the rejection. Nothing is repaired:
//! a response either passes every gate unchanged or is rejected.

mod extract;
mod scan;

pub use scan::{CodeHit, CodeScanner};

use crate::error::OutputError;
use artc_artifact::{ArtifactKind, ArtifactPayload};
use artc_schema::SchemaValidator;
use std::sync::Arc;

/// Default ceiling on non-whitespace characters around the artifact
pub const DEFAULT_MAX_SURROUNDING_CHARS: usize = 80;

/// Validates raw responses into payloads
#[derive(Debug, Clone)]
pub struct OutputPipeline {
    validator: SchemaValidator,
    scanner: Arc<CodeScanner>,
    max_surrounding_chars: usize,
}

impl OutputPipeline {
    /// Create pipeline over an injected validator
    #[must_use]
    pub fn new(validator: SchemaValidator) -> Self {
        Self {
            validator,
            scanner: Arc::new(CodeScanner::new()),
            max_surrounding_chars: DEFAULT_MAX_SURROUNDING_CHARS,
        }
    }

    /// Set the lead-in/trailer allowance
    #[must_use]
    pub fn with_max_surrounding_chars(mut self, max: usize) -> Self {
        self.max_surrounding_chars = max;
        self
    }

    /// Schema validator in use
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Run every gate on `raw` for an artifact of `kind`
    ///
    /// # Errors
    /// The first failing gate's `OutputError`
    pub fn process(&self, kind: ArtifactKind, raw: &str) -> Result<ArtifactPayload, OutputError> {
        let extraction = extract::extract(raw)?;
        if !extract::is_trivial(&extraction.before, &extraction.after, self.max_surrounding_chars) {
            return Err(OutputError::ExplanatoryText {
                before: extraction.before.trim().to_string(),
                after: extraction.after.trim().to_string(),
            });
        }
        tracing::debug!(kind = %kind, fenced = extraction.fenced, bytes = extraction.json.len(), "extracted artifact");

        let document = extract::parse_object(extraction.json)?;
        self.validator.validate(kind, &document)?;

        if let Some(hit) = self.scanner.scan(&document) {
            return Err(OutputError::CodeInOutput {
                path: hit.path,
                family: hit.family,
                signature: hit.signature,
            });
        }

        ArtifactPayload::new(kind, document).map_err(|_| OutputError::NoJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn pipeline() -> OutputPipeline {
        OutputPipeline::new(SchemaValidator::builtin())
    }

    const SCAFFOLD: &str = r#"{"modules": [{"path": "src/cli", "kind": "directory", "purpose": "argument parsing"}]}"#;

    #[test]
    fn accepts_bare_artifact() {
        let payload = pipeline().process(ArtifactKind::ScaffoldPlan, SCAFFOLD).unwrap();
        assert_eq!(payload.kind(), ArtifactKind::ScaffoldPlan);
        assert_eq!(payload.document()["modules"][0]["path"], "src/cli");
    }

    #[test]
    fn accepts_fenced_artifact_with_lead_in() {
        let raw = format!("Here you go:\n```json\n{SCAFFOLD}\n```");
        assert!(pipeline().process(ArtifactKind::ScaffoldPlan, &raw).is_ok());
    }

    #[test]
    fn rejects_lead_in_and_trailer() {
        let raw = format!("Here you go:\n{SCAFFOLD}\nLet me know if you need more.");
        let err = pipeline().process(ArtifactKind::ScaffoldPlan, &raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExplanatoryText);
    }

    #[test]
    fn lead_in_allowance_is_configurable() {
        let raw = format!("Here you go:\n{SCAFFOLD}");
        let strict = pipeline().with_max_surrounding_chars(0);
        assert_eq!(
            strict.process(ArtifactKind::ScaffoldPlan, &raw).unwrap_err().kind(),
            ErrorKind::ExplanatoryText
        );
    }

    #[test]
    fn schema_violations_are_complete() {
        let raw = r#"{"modules": [{"path": "", "kind": "symlink"}], "extra": 1}"#;
        match pipeline().process(ArtifactKind::ScaffoldPlan, raw).unwrap_err() {
            OutputError::SchemaViolation { violations, .. } => {
                let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
                assert!(paths.contains(&"/modules/0/path"));
                assert!(paths.contains(&"/modules/0/kind"));
                assert!(violations.len() >= 4, "{violations:#?}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn code_in_valid_artifact_is_rejected() {
        let raw = r#"{"modules": [{"path": "src/main.rs", "kind": "file", "purpose": "fn main() {\n    println!(\"hi\");\n}"}]}"#;
        match pipeline().process(ArtifactKind::ScaffoldPlan, raw).unwrap_err() {
            OutputError::CodeInOutput { path, family, .. } => {
                assert_eq!(path, "$.modules[0].purpose");
                assert_eq!(family, Some(crate::language::LanguageFamily::Rust));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_not_repaired() {
        let raw = r#"{"modules": [{"path": "src", "kind": "file", "purpose": "x"},]}"#;
        assert_eq!(
            pipeline().process(ArtifactKind::ScaffoldPlan, raw).unwrap_err().kind(),
            ErrorKind::InvalidJson
        );
    }
}
