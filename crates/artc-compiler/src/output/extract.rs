//! Locating the single JSON object in a raw model response
//!
//! Accepted shapes: a bare object, or one fenced block holding an object,
//! optionally with a short lead-in or trailer. Scanning is depth-aware and
//! string-aware inside objects so braces in string values never split an
//! artifact.

use crate::error::OutputError;
use serde_json::Value;

/// Half-width of the text window quoted for a parse error
const SNIPPET_RADIUS: usize = 60;

/// Located artifact text plus whatever surrounded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extraction<'a> {
    pub(crate) json: &'a str,
    pub(crate) before: String,
    pub(crate) after: String,
    pub(crate) fenced: bool,
}

#[derive(Debug, Clone)]
struct Fence {
    start: usize,
    body_start: usize,
    body_end: usize,
    end: usize,
    info: String,
}

impl Fence {
    fn body<'a>(&self, raw: &'a str) -> &'a str {
        &raw[self.body_start..self.body_end]
    }

    fn carries_json(&self, raw: &str) -> bool {
        match self.info.as_str() {
            "json" | "jsonc" | "json5" => true,
            "" => self.body(raw).trim_start().starts_with('{'),
            _ => false,
        }
    }
}

/// Find the one artifact in `raw`
pub(crate) fn extract(raw: &str) -> Result<Extraction<'_>, OutputError> {
    let fences = find_fences(raw);
    let json_fences: Vec<&Fence> = fences.iter().filter(|f| f.carries_json(raw)).collect();

    match json_fences.as_slice() {
        [] => {}
        [fence] => return extract_fenced(raw, fence),
        many => return Err(OutputError::MultipleArtifacts { count: many.len() }),
    }

    match top_level_objects(raw).as_slice() {
        [] => Err(OutputError::NoJson),
        [(start, end)] => Ok(Extraction {
            json: &raw[*start..*end],
            before: raw[..*start].to_string(),
            after: raw[*end..].to_string(),
            fenced: false,
        }),
        many => Err(OutputError::MultipleArtifacts { count: many.len() }),
    }
}

fn extract_fenced<'a>(raw: &'a str, fence: &Fence) -> Result<Extraction<'a>, OutputError> {
    let body = fence.body(raw);
    match top_level_objects(body).as_slice() {
        [] => Err(OutputError::NoJson),
        [(start, end)] => Ok(Extraction {
            json: &body[*start..*end],
            before: format!("{}{}", &raw[..fence.start], &body[..*start]),
            after: format!("{}\n{}", &body[*end..], &raw[fence.end..]),
            fenced: true,
        }),
        many => Err(OutputError::MultipleArtifacts { count: many.len() }),
    }
}

/// Fenced blocks, in order; an unclosed fence runs to the end of the text
fn find_fences(raw: &str) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut open: Option<(usize, usize, String)> = None;
    let mut offset = 0;

    for line in raw.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if let Some((start, body_start, info)) = open.take() {
            if trimmed.starts_with("```") && trimmed.trim_start_matches('`').is_empty() {
                fences.push(Fence {
                    start,
                    body_start,
                    body_end: line_start,
                    end: offset,
                    info,
                });
            } else {
                open = Some((start, body_start, info));
            }
        } else if let Some(rest) = trimmed.strip_prefix("```") {
            let rest_start = line_start + (line.len() - line.trim_start().len()) + 3;
            if let Some(fence) = single_line_fence(rest, rest_start, line_start, offset) {
                fences.push(fence);
            } else {
                let info = rest.trim_start_matches('`').trim().to_ascii_lowercase();
                open = Some((line_start, offset, info));
            }
        }
    }

    if let Some((start, body_start, info)) = open {
        fences.push(Fence {
            start,
            body_start,
            body_end: raw.len(),
            end: raw.len(),
            info,
        });
    }
    fences
}

/// A fence that opens and closes on one line, e.g. ```` ```json {..}``` ````
///
/// `rest` follows the opening backticks and starts at byte `rest_start`.
fn single_line_fence(rest: &str, rest_start: usize, start: usize, end: usize) -> Option<Fence> {
    let inner = rest.strip_suffix("```")?;
    let info_len = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    if inner[info_len..].trim().is_empty() {
        return None;
    }
    Some(Fence {
        start,
        body_start: rest_start + info_len,
        body_end: rest_start + inner.len(),
        end,
        info: inner[..info_len].to_ascii_lowercase(),
    })
}

/// Byte ranges of top-level objects
///
/// A `{` at depth zero opens an object only if it looks like one: followed
/// by a key quote, or, when it starts its line, by a closing brace or a
/// bare `key:`. Prose such as `{plan}` or `use {x: y}` is skipped. An
/// unterminated object runs to the end.
fn top_level_objects(text: &str) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth == 0 {
            if c == '{' && opens_object(&text[..i], &text[i + 1..]) {
                depth = 1;
                start = i;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    regions.push((start, i + 1));
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        regions.push((start, text.len()));
    }
    regions
}

fn opens_object(before: &str, rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.starts_with('"') {
        return true;
    }
    let starts_line = before.rsplit('\n').next().unwrap_or_default().trim().is_empty();
    if !starts_line {
        return false;
    }
    if rest.starts_with(['\'', '}']) {
        return true;
    }
    let key_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    key_len > 0 && rest[key_len..].trim_start().starts_with(':')
}

/// Whether the text around the artifact is a mere lead-in or trailer
///
/// At most one non-blank line in total, and at most `max_chars`
/// non-whitespace characters.
pub(crate) fn is_trivial(before: &str, after: &str, max_chars: usize) -> bool {
    let lines = before
        .lines()
        .chain(after.lines())
        .filter(|l| !l.trim().is_empty())
        .count();
    let chars = before
        .chars()
        .chain(after.chars())
        .filter(|c| !c.is_whitespace())
        .count();
    lines <= 1 && chars <= max_chars
}

/// Parse the extracted text as a JSON object
pub(crate) fn parse_object(json: &str) -> Result<Value, OutputError> {
    match serde_json::from_str::<Value>(json) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(OutputError::NoJson),
        Err(e) => Err(OutputError::InvalidJson {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
            snippet: snippet_around(json, e.line(), e.column()),
        }),
    }
}

fn snippet_around(text: &str, line: usize, column: usize) -> String {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let pos = (line_start + column.saturating_sub(1)).min(text.len());

    let mut start = pos.saturating_sub(SNIPPET_RADIUS);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    text[start..end].replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_object() {
        let ex = extract(r#"{"a": 1}"#).unwrap();
        assert_eq!(ex.json, r#"{"a": 1}"#);
        assert!(ex.before.is_empty() && ex.after.is_empty());
        assert!(!ex.fenced);
    }

    #[test]
    fn fenced_object_with_lead_in() {
        let raw = "Here you go:\n```json\n{\"a\": \"}\"}\n```\n";
        let ex = extract(raw).unwrap();
        assert_eq!(ex.json, "{\"a\": \"}\"}");
        assert!(ex.fenced);
        assert!(is_trivial(&ex.before, &ex.after, 80));
    }

    #[test]
    fn concatenated_objects_are_multiple() {
        assert!(matches!(
            extract(r#"{"a":1}{"b":2}"#),
            Err(OutputError::MultipleArtifacts { count: 2 })
        ));
    }

    #[test]
    fn two_json_fences_are_multiple() {
        let raw = "```json\n{\"a\":1}\n```\n```json\n{\"b\":2}\n```";
        assert!(matches!(extract(raw), Err(OutputError::MultipleArtifacts { count: 2 })));
    }

    #[test]
    fn prose_without_object_is_no_json() {
        assert!(matches!(extract("I cannot help with {that}."), Err(OutputError::NoJson)));
        assert!(matches!(extract(""), Err(OutputError::NoJson)));
    }

    #[test]
    fn braces_in_prose_are_not_objects() {
        let raw = "You could write {x: y} inline.\nOr this:\n{\"a\": 1}";
        let ex = extract(raw).unwrap();
        assert_eq!(ex.json, "{\"a\": 1}");
        assert!(ex.before.contains("{x: y}"));
        assert!(!is_trivial(&ex.before, &ex.after, 80));

        assert!(matches!(extract("use {x: y} here"), Err(OutputError::NoJson)));
        assert_eq!(extract("{title: \"x\"}").unwrap().json, "{title: \"x\"}");
    }

    #[test]
    fn one_line_fence() {
        let ex = extract("```json {\"a\": 1}```").unwrap();
        assert_eq!(ex.json, "{\"a\": 1}");
        assert!(ex.fenced);
        assert!(is_trivial(&ex.before, &ex.after, 80));

        let lead_in = extract("Here it is:\n```{\"a\": 2}```\n").unwrap();
        assert_eq!(lead_in.json, "{\"a\": 2}");
        assert!(is_trivial(&lead_in.before, &lead_in.after, 80));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let raw = r#"{"a": "say \"}\" twice", "b": {"c": []}}"#;
        assert_eq!(extract(raw).unwrap().json, raw);
    }

    #[test]
    fn unterminated_object_runs_to_end() {
        let ex = extract("{\"a\": [1, 2").unwrap();
        assert_eq!(ex.json, "{\"a\": [1, 2");
        assert!(matches!(parse_object(ex.json), Err(OutputError::InvalidJson { .. })));
    }

    #[test]
    fn triviality() {
        assert!(is_trivial("Here is the plan:\n", "", 80));
        assert!(is_trivial("", "\n\nDone.\n", 80));
        assert!(!is_trivial("Here:", "Done.", 80));
        assert!(!is_trivial("Sure.\nI thought about this carefully.\n", "", 80));
        assert!(!is_trivial(&"x".repeat(81), "", 80));
    }

    #[test]
    fn invalid_json_carries_position_and_snippet() {
        let err = parse_object("{\n  \"a\": 1,\n  \"b\": oops\n}").unwrap_err();
        match err {
            OutputError::InvalidJson {
                line, snippet, ..
            } => {
                assert_eq!(line, 3);
                assert!(snippet.contains("oops"));
                assert!(snippet.chars().count() <= 2 * SNIPPET_RADIUS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = format!("{{\"k\": \"{}\" x}}", "é".repeat(100));
        let snippet = snippet_around(&text, 1, 150);
        assert!(!snippet.is_empty());
    }
}
