//! Prompt fragments and deterministic prompt assembly
//!
//! A prompt is built from four blocks, always in the same order:
//!
//! ```text
//! SYSTEM DIRECTIVE   constant
//! PASS               purpose + common rules + pass rules
//! CONTEXT            files by path, artifacts by id, target file
//! OUTPUT SCHEMA      pretty-printed schema document
//! ```
//!
//! Identical contexts yield byte-identical prompts: every map involved is
//! ordered and nothing time- or environment-dependent is interpolated.

use crate::context::CompilerContext;
use crate::error::PromptError;
use crate::pass::{PassSpec, COMMON_RULES};
use artc_artifact::ArtifactKind;
use moka::sync::Cache;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Constant opening of every prompt
pub const SYSTEM_DIRECTIVE: &str = "You are a compiler stage, not an assistant. \
You receive a fixed context and emit exactly one JSON object that conforms to \
the output schema. You never emit prose, explanations or source code.";

/// Purpose text and rules for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFragment {
    /// Task statement
    pub purpose: String,
    /// Pass-specific rules, in order
    pub rules: Vec<String>,
}

impl PromptFragment {
    /// Fragment declared in the static pass table
    #[must_use]
    pub fn builtin(kind: ArtifactKind) -> Self {
        let spec = PassSpec::for_kind(kind);
        Self {
            purpose: spec.purpose.to_string(),
            rules: spec.rules.iter().map(ToString::to_string).collect(),
        }
    }

    /// Parse an override file
    ///
    /// Lines starting with `- ` are rules; other non-blank lines, except
    /// `#` headings, form the purpose.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut purpose = Vec::new();
        let mut rules = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix("- ") {
                Some(rule) => rules.push(rule.trim().to_string()),
                None => purpose.push(line),
            }
        }
        Self {
            purpose: purpose.join(" "),
            rules,
        }
    }
}

/// Where fragments come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptSource {
    /// Static pass table only
    #[default]
    Builtin,
    /// `<dir>/<kind>.prompt.md`, falling back to the pass table
    Directory(PathBuf),
}

/// Loads, caches and assembles prompts
#[derive(Debug, Clone)]
pub struct PromptManager {
    source: PromptSource,
    fragments: Cache<ArtifactKind, Arc<PromptFragment>>,
}

impl PromptManager {
    /// Create manager over a fragment source
    #[must_use]
    pub fn new(source: PromptSource) -> Self {
        Self {
            source,
            fragments: Cache::new(ArtifactKind::ALL.len() as u64),
        }
    }

    /// Manager using built-in fragments only
    #[inline]
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(PromptSource::Builtin)
    }

    /// Manager reading overrides from `dir`
    #[inline]
    #[must_use]
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(PromptSource::Directory(dir.into()))
    }

    /// Override file location for `kind`
    #[must_use]
    pub fn override_path(dir: &Path, kind: ArtifactKind) -> PathBuf {
        dir.join(format!("{}.prompt.md", kind.as_str()))
    }

    /// Fragment for `kind`, loading on first use
    ///
    /// # Errors
    /// `PromptError` if an override exists but cannot be read or is empty
    pub fn fragment(&self, kind: ArtifactKind) -> Result<Arc<PromptFragment>, PromptError> {
        if let Some(cached) = self.fragments.get(&kind) {
            return Ok(cached);
        }
        let fragment = Arc::new(self.load(kind)?);
        self.fragments.insert(kind, Arc::clone(&fragment));
        Ok(fragment)
    }

    /// Drop cached fragments so overrides are re-read
    #[inline]
    pub fn invalidate_all(&self) {
        self.fragments.invalidate_all();
    }

    fn load(&self, kind: ArtifactKind) -> Result<PromptFragment, PromptError> {
        let PromptSource::Directory(dir) = &self.source else {
            return Ok(PromptFragment::builtin(kind));
        };

        let path = Self::override_path(dir, kind);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let fragment = PromptFragment::parse(&text);
                if fragment.purpose.is_empty() {
                    return Err(PromptError::EmptyPurpose { path });
                }
                tracing::debug!(kind = %kind, path = %path.display(), "loaded prompt override");
                Ok(fragment)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PromptFragment::builtin(kind)),
            Err(source) => Err(PromptError::Io { path, source }),
        }
    }

    /// Assemble the full prompt for `context`
    ///
    /// # Errors
    /// Fragment load failures
    pub fn assemble(&self, context: &CompilerContext, schema: &Value) -> Result<String, PromptError> {
        let kind = context.pass_type();
        let fragment = self.fragment(kind)?;
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "SYSTEM DIRECTIVE:\n{SYSTEM_DIRECTIVE}\n");

        let _ = writeln!(out, "PASS: {}", kind.name());
        let _ = writeln!(out, "PURPOSE:\n{}\n", fragment.purpose);
        let _ = writeln!(out, "RULES:");
        for (n, rule) in COMMON_RULES
            .iter()
            .copied()
            .chain(fragment.rules.iter().map(String::as_str))
            .enumerate()
        {
            let _ = writeln!(out, "{}. {rule}", n + 1);
        }
        out.push('\n');

        let _ = writeln!(out, "CONTEXT:");
        for (path, content) in context.project_files() {
            let _ = writeln!(out, "--- FILE: {path} ---\n{}\n--- END FILE ---", content.trim_end());
        }
        for (id, artifact) in context.artifacts() {
            let body = serde_json::to_string_pretty(&artifact.payload).unwrap_or_default();
            let _ = writeln!(
                out,
                "--- ARTIFACT: {id} ({}, {}) ---\n{body}\n--- END ARTIFACT ---",
                artifact.artifact_type.name(),
                artifact.status
            );
        }
        if let Some(target) = context.target_file() {
            let _ = writeln!(out, "--- TARGET FILE: {target} ---");
        }
        out.push('\n');

        let schema_text = serde_json::to_string_pretty(schema).unwrap_or_default();
        let _ = writeln!(out, "OUTPUT SCHEMA:\n{schema_text}\n");
        let _ = write!(
            out,
            "Respond with exactly one {} JSON object conforming to the schema above.",
            kind.name()
        );
        Ok(out)
    }
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artc_schema::builtin_schema;

    fn context() -> CompilerContext {
        CompilerContext::new(ArtifactKind::ProjectPlan)
            .with_file("docs/b.md", "second")
            .with_file("docs/a.md", "first")
    }

    #[test]
    fn assembly_is_ordered_and_complete() {
        let manager = PromptManager::builtin();
        let schema = builtin_schema(ArtifactKind::ProjectPlan);
        let prompt = manager.assemble(&context(), &schema).unwrap();

        let directive = prompt.find("SYSTEM DIRECTIVE").unwrap();
        let pass = prompt.find("PASS: ProjectPlan").unwrap();
        let a = prompt.find("--- FILE: docs/a.md ---").unwrap();
        let b = prompt.find("--- FILE: docs/b.md ---").unwrap();
        let out = prompt.find("OUTPUT SCHEMA").unwrap();
        assert!(directive < pass && pass < a && a < b && b < out);
        assert!(prompt.contains("1. Emit exactly one JSON object"));
    }

    #[test]
    fn identical_context_gives_identical_prompt() {
        let manager = PromptManager::builtin();
        let schema = builtin_schema(ArtifactKind::ProjectPlan);
        let reversed = CompilerContext::new(ArtifactKind::ProjectPlan)
            .with_file("docs/a.md", "first")
            .with_file("docs/b.md", "second");

        assert_eq!(
            manager.assemble(&context(), &schema).unwrap(),
            manager.assemble(&reversed, &schema).unwrap()
        );
    }

    #[test]
    fn override_directory_replaces_fragment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            PromptManager::override_path(dir.path(), ArtifactKind::ProjectPlan),
            "# Project plan\nSummarise the brief.\n- Keep it short.\n",
        )
        .unwrap();
        let manager = PromptManager::with_override_dir(dir.path());

        let fragment = manager.fragment(ArtifactKind::ProjectPlan).unwrap();
        assert_eq!(fragment.purpose, "Summarise the brief.");
        assert_eq!(fragment.rules, vec!["Keep it short.".to_string()]);

        // No override for this kind
        assert_eq!(
            *manager.fragment(ArtifactKind::TestPlan).unwrap(),
            PromptFragment::builtin(ArtifactKind::TestPlan)
        );
    }

    #[test]
    fn empty_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            PromptManager::override_path(dir.path(), ArtifactKind::ScaffoldPlan),
            "- only a rule\n",
        )
        .unwrap();
        let manager = PromptManager::with_override_dir(dir.path());
        assert!(matches!(
            manager.fragment(ArtifactKind::ScaffoldPlan),
            Err(PromptError::EmptyPurpose { .. })
        ));
    }
}
