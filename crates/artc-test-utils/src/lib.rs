//! Testing utilities for ARTC workspace
//!
//! Shared test helpers and fixtures.

#![allow(missing_docs)]

use artc_artifact::ArtifactKind;
use artc_compiler::{InvocationRequest, ModelInvocation, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Model that answers with a fixed script, one response per call
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(ArtifactKind, String)>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond with `document` serialized as JSON
    pub fn json(document: &Value) -> Self {
        Self::new([document.to_string()])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Prompts received, with the pass that sent each
    pub fn calls(&self) -> Vec<(ArtifactKind, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl ModelInvocation for ScriptedModel {
    async fn invoke(&self, request: InvocationRequest<'_>) -> Result<String, TransportError> {
        self.calls
            .lock()
            .push((request.pass, request.prompt.to_string()));
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Provider {
                provider: "scripted".to_string(),
                detail: "script exhausted".to_string(),
            })
    }
}

/// Schema-valid document for each artifact type
pub fn valid_document(kind: ArtifactKind) -> Value {
    match kind {
        ArtifactKind::ProjectPlan => json!({
            "title": "Expression parser",
            "summary": "Parse and evaluate arithmetic expressions",
            "goals": ["tokenize input", "evaluate with precedence"],
            "milestones": [
                {"name": "lexer", "description": "Split input into tokens"},
                {"name": "evaluator", "description": "Evaluate token streams"}
            ]
        }),
        ArtifactKind::ScaffoldPlan => json!({
            "modules": [
                {"path": "src/lexer.rs", "kind": "file", "purpose": "Tokenizer"},
                {"path": "tests", "kind": "directory", "purpose": "Integration tests"}
            ]
        }),
        ArtifactKind::TestPlan => test_plan_document(&["tests/lexer.rs"]),
        ArtifactKind::ImplementationPlan => json!({
            "target_file": "src/lexer.rs",
            "steps": [
                {"order": 1, "description": "Define the token enum", "covers_tests": ["T1"]},
                {"order": 2, "description": "Scan digits and operators"}
            ]
        }),
        ArtifactKind::RefactorPlan => json!({
            "target_file": "src/lexer.rs",
            "refactorings": [
                {"kind": "extract_function", "target": "scan", "description": "Pull digit scanning out of the main loop"}
            ],
            "preserves_behavior": true
        }),
        ArtifactKind::ValidationResult => json!({
            "test_plan_id": "01J0000000000000000000TEST",
            "passed": false,
            "summary": "1 of 2 tests failed",
            "results": [
                {"test_id": "T1", "status": "pass"},
                {"test_id": "T2", "status": "fail", "message": "unexpected token"}
            ]
        }),
        ArtifactKind::FailureReport => json!({
            "validation_result_id": "01J0000000000000000000VALR",
            "summary": "Minus sign is read as an operator",
            "failures": [
                {"test_id": "T2", "symptom": "negative literal rejected", "suspected_cause": "no unary minus handling"}
            ]
        }),
    }
}

/// TestPlan declaring one test case per file
pub fn test_plan_document(paths: &[&str]) -> Value {
    let files: Vec<Value> = paths
        .iter()
        .map(|p| json!({"path": p, "framework": "cargo test", "purpose": "lexer behaviour"}))
        .collect();
    let cases: Vec<Value> = paths
        .iter()
        .enumerate()
        .map(|(i, p)| json!({"id": format!("T{}", i + 1), "file": p, "description": "tokenizes input"}))
        .collect();
    json!({"test_files": files, "test_cases": cases})
}

/// Temporary project directory
#[derive(Debug)]
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp project"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a project file, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write project file");
        path
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(relative)).expect("read project file")
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fixture_is_an_object() {
        for kind in ArtifactKind::ALL {
            assert!(valid_document(kind).is_object(), "{kind}");
        }
    }

    #[tokio::test]
    async fn script_runs_in_order_then_fails() {
        let model = ScriptedModel::new(["one", "two"]);
        let schema = json!({});
        let request = InvocationRequest {
            pass: ArtifactKind::ProjectPlan,
            prompt: "p",
            schema: &schema,
            temperature: 0.0,
            max_artifacts: 1,
        };
        assert_eq!(model.invoke(request).await.unwrap(), "one");
        assert_eq!(model.invoke(request).await.unwrap(), "two");
        assert!(model.invoke(request).await.is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[test]
    fn temp_project_writes_nested_files() {
        let project = TempProject::new();
        project.write("tests/a/b.rs", "x");
        assert_eq!(project.read("tests/a/b.rs"), "x");
    }
}
