//! Code-contamination scan
//!
//! Walks every string value of a parsed artifact and flags text that reads
//! as source code. A string is flagged when it contains a fenced code
//! marker, when two distinct signatures of one language family match, or
//! when one signature matches a multi-line string dense with structural
//! symbols.

use crate::language::LanguageFamily;
use regex::Regex;
use serde_json::Value;

/// Share of structural symbols above which a multi-line string reads as code
const SYMBOL_DENSITY_THRESHOLD: f64 = 0.06;

const STRUCTURAL_SYMBOLS: &[char] = &['{', '}', '(', ')', ';', '=', '<', '>', '[', ']'];

/// Where and why code was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeHit {
    /// JSON path of the string, e.g. `$.steps[2].description`
    pub path: String,
    /// Family whose signatures matched; `None` for a bare fence
    pub family: Option<LanguageFamily>,
    /// Names of the matching signatures
    pub signature: String,
}

#[derive(Debug)]
struct Signature {
    name: &'static str,
    pattern: Regex,
}

#[derive(Debug)]
struct FamilySignatures {
    family: LanguageFamily,
    signatures: Vec<Signature>,
}

/// Compiled signature sets for every language family
#[derive(Debug)]
pub struct CodeScanner {
    fence: Regex,
    families: Vec<FamilySignatures>,
}

impl CodeScanner {
    /// Compile the signature sets
    #[must_use]
    pub fn new() -> Self {
        let families = LanguageFamily::ALL
            .into_iter()
            .map(|family| FamilySignatures {
                family,
                signatures: signature_patterns(family)
                    .iter()
                    .map(|(name, pattern)| Signature {
                        name,
                        pattern: Regex::new(pattern).expect("valid signature pattern"),
                    })
                    .collect(),
            })
            .collect();

        Self {
            fence: Regex::new(r"(?m)^\s*```|```[A-Za-z]*\s*$").expect("valid fence pattern"),
            families,
        }
    }

    /// First string in document order that reads as code
    #[must_use]
    pub fn scan(&self, document: &Value) -> Option<CodeHit> {
        self.walk(document, "$".to_string())
    }

    fn walk(&self, value: &Value, path: String) -> Option<CodeHit> {
        match value {
            Value::String(text) => self.classify(text).map(|(family, signature)| CodeHit {
                path,
                family,
                signature,
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| self.walk(item, format!("{path}[{i}]"))),
            Value::Object(map) => map
                .iter()
                .find_map(|(key, item)| self.walk(item, child_path(&path, key))),
            Value::Null | Value::Bool(_) | Value::Number(_) => None,
        }
    }

    /// Family and signature names if `text` reads as code
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<(Option<LanguageFamily>, String)> {
        if self.fence.is_match(text) {
            return Some((None, "fenced code block".to_string()));
        }

        let multi_line = text.lines().filter(|l| !l.trim().is_empty()).count() >= 2;
        let dense = multi_line && symbol_density(text) >= SYMBOL_DENSITY_THRESHOLD;

        for set in &self.families {
            let matched: Vec<&str> = set
                .signatures
                .iter()
                .filter(|s| s.pattern.is_match(text))
                .map(|s| s.name)
                .collect();
            if matched.len() >= 2 || (matched.len() == 1 && dense) {
                return Some((Some(set.family), matched.join(", ")));
            }
        }
        None
    }
}

impl Default for CodeScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn child_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("{parent}.{key}")
    } else {
        format!("{parent}[{key:?}]")
    }
}

#[allow(clippy::cast_precision_loss)]
fn symbol_density(text: &str) -> f64 {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return 0.0;
    }
    let symbols = text.chars().filter(|c| STRUCTURAL_SYMBOLS.contains(c)).count();
    symbols as f64 / visible as f64
}

fn signature_patterns(family: LanguageFamily) -> &'static [(&'static str, &'static str)] {
    match family {
        LanguageFamily::Rust => &[
            (
                "fn definition",
                r"\bfn\s+[A-Za-z_]\w*\s*(<[^>]*>)?\s*\([^)]*\)\s*(->\s*[^{]+)?\{",
            ),
            ("let binding", r"\blet\s+(mut\s+)?[A-Za-z_]\w*\s*(:\s*[^=]+)?=\s*[^;]+;"),
            ("impl block", r"\bimpl(\s*<[^>]*>)?\s+[A-Za-z_][\w:<>, ]*\s*\{"),
            ("use declaration", r"(?m)^\s*use\s+[A-Za-z_]\w*(::[\w{}*, ]+)+;"),
            ("macro call", r"\b[a-z_][a-z0-9_]*![(\[{]"),
        ],
        LanguageFamily::Python => &[
            (
                "def statement",
                r"(?m)^\s*(async\s+)?def\s+[A-Za-z_]\w*\s*\([^)]*\)\s*(->\s*[^:]+)?:",
            ),
            ("class statement", r"(?m)^\s*class\s+[A-Za-z_]\w*(\([^)]*\))?\s*:\s*$"),
            (
                "import statement",
                r"(?m)^\s*(from\s+[\w.]+\s+import\s+\w+|import\s+[\w.]+(\s+as\s+\w+)?\s*$)",
            ),
            ("indented return", r"(?m)^[ \t]+return\b"),
        ],
        LanguageFamily::JavaScript => &[
            ("function declaration", r"\bfunction\s*\*?\s*[A-Za-z_$]?[\w$]*\s*\([^)]*\)\s*\{"),
            ("arrow function", r"\([^)]*\)\s*=>\s*[{(]"),
            (
                "variable declaration",
                r"\b(const|let|var)\s+[A-Za-z_$][\w$]*\s*(:\s*[\w<>\[\]|, ]+)?\s*=\s*[^;]+;",
            ),
            ("module import", r#"(?m)^\s*import\s+.+\s+from\s+['"][^'"]+['"];?"#),
            ("export", r"(?m)^\s*export\s+(default|const|function|class|interface|type)\b"),
        ],
        LanguageFamily::CFamily => &[
            ("include directive", r#"(?m)^\s*#include\s*[<"]"#),
            (
                "typed function",
                r"\b(public|private|protected|static|void|int|char|double|float|bool)\s+[\w<>\[\]]+\s*\([^)]*\)\s*\{",
            ),
            ("go func", r"\bfunc\s+(\([^)]*\)\s*)?[A-Za-z_]\w*\s*\([^)]*\)[^{\n]*\{"),
            ("package clause", r"(?m)^\s*package\s+[\w.]+;?\s*$"),
            ("terminated statement", r"(?m)[\w)\]]\s*;\s*$"),
        ],
        LanguageFamily::Ruby => &[
            ("def block", r"(?m)^\s*def\s+\w+[?!]?(\([^)]*\))?\s*$"),
            ("end keyword", r"(?m)^\s*end\s*$"),
            ("block argument", r"\bdo\s*\|[\w, ]+\|"),
        ],
        LanguageFamily::Php => &[
            ("php open tag", r"<\?php"),
            ("php variable assignment", r"\$[A-Za-z_]\w*\s*=\s*[^;]+;"),
            ("php function", r"\bfunction\s+[A-Za-z_]\w*\s*\(\s*\$"),
        ],
        LanguageFamily::Shell => &[
            ("shebang", r"(?m)^#!/"),
            ("shell conditional", r"(?m)^\s*(if\s+\[|fi\s*$|then\s*$)"),
            ("shell loop", r"(?m)^\s*(for\s+\w+\s+in\s+.+;\s*do|done\s*$)"),
            ("variable expansion", r#"\$\{?[A-Za-z_]\w*\}?\s*[|>]|"\$[A-Za-z_]\w*""#),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_plan_text_passes() {
        let scanner = CodeScanner::new();
        let doc = json!({
            "title": "CLI parser",
            "steps": [
                {"order": 1, "description": "Add a function that parses flags and returns a config."},
                {"order": 2, "description": "Reject unknown flags; report them by name (see tests T1, T2)."}
            ],
            "risks": ["Let users = admins in some deployments; clarify with the owner."]
        });
        assert_eq!(scanner.scan(&doc), None);
    }

    #[test]
    fn rust_function_is_flagged_with_path() {
        let scanner = CodeScanner::new();
        let doc = json!({
            "steps": [
                {"description": "ok"},
                {"description": "ok"},
                {"description": "fn parse(input: &str) -> Result<Config, Error> {\n    let args = split(input);\n}"}
            ]
        });
        let hit = scanner.scan(&doc).unwrap();
        assert_eq!(hit.path, "$.steps[2].description");
        assert_eq!(hit.family, Some(LanguageFamily::Rust));
        assert!(hit.signature.contains("fn definition"));
    }

    #[test]
    fn fence_marker_is_flagged() {
        let scanner = CodeScanner::new();
        let hit = scanner
            .scan(&json!({"summary": "Use this:\n```\nrun it\n```"}))
            .unwrap();
        assert_eq!(hit.family, None);
        assert_eq!(hit.path, "$.summary");
    }

    #[test]
    fn python_needs_two_signatures_or_density() {
        let scanner = CodeScanner::new();
        assert!(scanner.classify("def load(path):\n    return open(path)").is_some());
        assert!(scanner.classify("Import the data as CSV.").is_none());
    }

    #[test]
    fn single_signature_single_line_passes() {
        let scanner = CodeScanner::new();
        // One JavaScript signature on one line of prose
        assert!(scanner.classify("const limit = 10; is the default").is_none());
    }

    fn signature(family: LanguageFamily, name: &str) -> Regex {
        let (_, pattern) = signature_patterns(family)
            .iter()
            .find(|(n, _)| *n == name)
            .unwrap();
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn exclamations_and_blank_lines_are_not_code() {
        let macro_call = signature(LanguageFamily::Rust, "macro call");
        assert!(macro_call.is_match("println!(\"{x}\")"));
        assert!(macro_call.is_match("let v = vec![1, 2];"));
        assert!(!macro_call.is_match("Say hello world! (twice)"));

        let ret = signature(LanguageFamily::Python, "indented return");
        assert!(ret.is_match("def f():\n    return 1"));
        assert!(!ret.is_match("Steps:\n\nreturn early on bad input"));
    }

    #[test]
    fn odd_keys_are_quoted_in_paths() {
        assert_eq!(child_path("$", "test_files"), "$.test_files");
        assert_eq!(child_path("$", "given when"), "$[\"given when\"]");
        assert_eq!(child_path("$.a", "0x"), "$.a[\"0x\"]");
    }
}
