//! Code sanitizer: raw model text in, component source out.
//!
//! Models wrap code in markdown fences and chat around it despite being told
//! not to. `clean` strips that down to the component definition. It is pure
//! and never fails: text it cannot improve passes through trimmed, and the
//! compiler reports whatever is still wrong.

const FENCE: &str = "```";

/// Language tags accepted after an opening fence, in match order.
const FENCE_TAGS: [&str; 6] = ["jsx", "tsx", "javascript", "typescript", "js", "ts"];

const COMPONENT_START: &str = "const Component";
const DEFINITION_END: &str = "};";

/// Normalize raw upstream text to component source. Idempotent.
#[must_use]
pub fn clean(raw: &str) -> String {
    let stripped = strip_fences(raw);
    let mut code = stripped.trim();

    if let Some(start) = code.find(COMPONENT_START) {
        code = &code[start..];
    }

    if let Some(end) = code.rfind(DEFINITION_END) {
        let cut = end + DEFINITION_END.len();
        let trailing = code[cut..].trim();
        if !trailing.is_empty() && !trailing.starts_with("const") && !trailing.starts_with("function") {
            code = &code[..cut];
        }
    }

    code.trim().to_owned()
}

/// Remove markdown fence markers. Fence-only lines disappear; a fence that
/// shares a line with code is cut off and the code kept.
#[must_use]
pub fn strip_fences(raw: &str) -> String {
    let kept: Vec<&str> = raw.trim().lines().filter_map(strip_fence_line).collect();
    kept.join("\n").trim().to_owned()
}

fn strip_fence_line(line: &str) -> Option<&str> {
    let mut rest = line;
    loop {
        if let Some(after) = rest.strip_prefix(FENCE) {
            let after = FENCE_TAGS.iter().find_map(|tag| after.strip_prefix(tag)).unwrap_or(after);
            rest = after.trim_start();
        } else if let Some(before) = rest.trim_end().strip_suffix(FENCE) {
            rest = before;
        } else {
            break;
        }
        if rest.trim().is_empty() {
            return None;
        }
    }
    Some(rest)
}

#[cfg(test)]
#[path = "sanitize_test.rs"]
mod tests;
