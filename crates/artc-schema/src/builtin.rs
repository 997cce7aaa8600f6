//! Built-in JSON Schemas (Draft 7), one per artifact type

use artc_artifact::ArtifactKind;
use serde_json::{json, Value};

const DRAFT_7: &str = "http://json-schema.org/draft-07/schema#";

/// Built-in schema document for `kind`
#[must_use]
pub fn builtin_schema(kind: ArtifactKind) -> Value {
    let mut schema = match kind {
        ArtifactKind::ProjectPlan => project_plan(),
        ArtifactKind::ScaffoldPlan => scaffold_plan(),
        ArtifactKind::TestPlan => test_plan(),
        ArtifactKind::ImplementationPlan => implementation_plan(),
        ArtifactKind::RefactorPlan => refactor_plan(),
        ArtifactKind::ValidationResult => validation_result(),
        ArtifactKind::FailureReport => failure_report(),
    };
    if let Value::Object(map) = &mut schema {
        map.insert("$schema".to_string(), json!(DRAFT_7));
        map.insert("title".to_string(), json!(kind.name()));
    }
    schema
}

fn text() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

fn text_list(min_items: u64) -> Value {
    json!({ "type": "array", "items": text(), "minItems": min_items })
}

fn project_plan() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["title", "summary", "goals", "milestones"],
        "properties": {
            "title": text(),
            "summary": text(),
            "goals": text_list(1),
            "constraints": text_list(0),
            "non_goals": text_list(0),
            "milestones": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name", "description"],
                    "properties": {
                        "name": text(),
                        "description": text(),
                        "deliverables": text_list(0)
                    }
                }
            }
        }
    })
}

fn scaffold_plan() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["modules"],
        "properties": {
            "modules": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["path", "kind", "purpose"],
                    "properties": {
                        "path": text(),
                        "kind": { "type": "string", "enum": ["file", "directory"] },
                        "purpose": text()
                    }
                }
            },
            "conventions": text_list(0)
        }
    })
}

fn test_plan() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["test_files", "test_cases"],
        "properties": {
            "test_files": {
                "type": "array",
                "minItems": 1,
                // A bare path or a described entry. Keywords that only apply to one of
                // the two shapes keep violations addressable at the nested field.
                "items": {
                    "type": ["string", "object"],
                    "minLength": 1,
                    "additionalProperties": false,
                    "required": ["path", "purpose"],
                    "properties": {
                        "path": text(),
                        "framework": text(),
                        "purpose": text()
                    }
                }
            },
            "test_cases": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["id", "file", "description"],
                    "properties": {
                        "id": text(),
                        "file": text(),
                        "description": text(),
                        "given": text(),
                        "when": text(),
                        "then": text()
                    }
                }
            }
        }
    })
}

fn implementation_plan() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["target_file", "steps"],
        "properties": {
            "target_file": text(),
            "steps": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["order", "description"],
                    "properties": {
                        "order": { "type": "integer", "minimum": 1 },
                        "description": text(),
                        "covers_tests": text_list(0)
                    }
                }
            },
            "risks": text_list(0)
        }
    })
}

fn refactor_plan() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["target_file", "refactorings", "preserves_behavior"],
        "properties": {
            "target_file": text(),
            "refactorings": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["kind", "target", "description"],
                    "properties": {
                        "kind": {
                            "type": "string",
                            "enum": ["rename", "extract_function", "inline", "move", "reorder", "simplify"]
                        },
                        "target": text(),
                        "description": text(),
                        "rationale": text()
                    }
                }
            },
            "preserves_behavior": { "const": true }
        }
    })
}

fn validation_result() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["test_plan_id", "passed", "summary", "results"],
        "properties": {
            "test_plan_id": text(),
            "passed": { "type": "boolean" },
            "summary": text(),
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["test_id", "status"],
                    "properties": {
                        "test_id": text(),
                        "status": { "type": "string", "enum": ["pass", "fail", "error", "skipped"] },
                        "message": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn failure_report() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["validation_result_id", "summary", "failures"],
        "properties": {
            "validation_result_id": text(),
            "summary": text(),
            "failures": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["test_id", "symptom", "suspected_cause"],
                    "properties": {
                        "test_id": text(),
                        "symptom": text(),
                        "suspected_cause": text(),
                        "suggested_fix_area": text()
                    }
                }
            }
        }
    })
}
