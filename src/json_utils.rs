use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

static RE_OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").unwrap());
static RE_CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```\s*$").unwrap());

/// Trim the text and remove one surrounding code fence (with or without a language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let open_len = RE_OPEN_FENCE.find(trimmed).map(|m| m.end()).unwrap_or(3);
    let body = &trimmed[open_len..];
    let body = match RE_CLOSE_FENCE.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    };
    body.trim()
}

/// Type of a JSON node found by the scanner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Coordinates of a JSON structure within a larger text, including nested children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjCoords {
    pub start: usize,
    pub end: usize, // inclusive index of the closing bracket/brace
    pub kind: NodeType,
    pub children: Vec<ObjCoords>,
}

impl ObjCoords {
    pub fn new(start: usize, end: usize, kind: NodeType, children: Vec<ObjCoords>) -> Self {
        Self { start, end, kind, children }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.end]
    }
}

#[derive(Debug)]
struct Frame {
    start: usize,
    kind: NodeType,
    children: Vec<ObjCoords>,
}

/// Find all JSON object/array structures in the given text. Coordinates are byte indices.
#[instrument(target = "homework_quiz::json", skip(text), fields(len = text.len()))]
pub fn find_json_structures(text: &str) -> Vec<ObjCoords> {
    let bytes = text.as_bytes();
    let mut results: Vec<ObjCoords> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match b {
                b'\\' => escape = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let closing = match b {
            b'"' => {
                in_string = true;
                None
            }
            b'{' => {
                stack.push(Frame { start: i, kind: NodeType::Object, children: Vec::new() });
                None
            }
            b'[' => {
                stack.push(Frame { start: i, kind: NodeType::Array, children: Vec::new() });
                None
            }
            b'}' => Some(NodeType::Object),
            b']' => Some(NodeType::Array),
            _ => None,
        };

        let Some(kind) = closing else { continue };
        // Mismatched closers drop the open frame.
        if let Some(frame) = stack.pop() {
            if frame.kind == kind {
                let node = ObjCoords::new(frame.start, i, kind, frame.children);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => results.push(node),
                }
            }
        }
    }

    debug!(target: "homework_quiz::json", count = results.len(), "found root structures");
    results
}

/// First JSON object embedded anywhere in `text` that satisfies `accept`, searching
/// roots in order and descending into children of rejected nodes.
pub fn find_object<F>(text: &str, accept: F) -> Option<Value>
where
    F: Fn(&Value) -> bool,
{
    fn visit<F: Fn(&Value) -> bool>(text: &str, node: &ObjCoords, accept: &F) -> Option<Value> {
        if node.kind == NodeType::Object {
            if let Ok(value) = serde_json::from_str::<Value>(node.slice(text)) {
                if accept(&value) {
                    return Some(value);
                }
            }
        }
        node.children.iter().find_map(|child| visit(text, child, accept))
    }

    find_json_structures(text).iter().find_map(|node| visit(text, node, &accept))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tagged_and_bare_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn unterminated_fence_keeps_body() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let s = r#"note {"text":"a } b { c","n":[1,2]} end"#;
        let roots = find_json_structures(s);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, NodeType::Object);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].kind, NodeType::Array);
    }

    #[test]
    fn find_object_descends_into_wrappers() {
        let s = r#"Här är svaret: [{"ignored":true}, {"score": 80}] klart"#;
        let found = find_object(s, |v| v.get("score").is_some()).unwrap();
        assert_eq!(found["score"], 80);
        assert!(find_object(s, |v| v.get("missing").is_some()).is_none());
    }
}
