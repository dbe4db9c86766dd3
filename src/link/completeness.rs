//! Message completeness without a length header.
//!
//! A message is complete when the buffer, after trimming and unwrapping at
//! most one level of JSON string quoting, is a `{…}` span whose braces
//! balance outside string literals.

/// Unwrap one level of JSON string quoting.
///
/// Returns `Some(inner)` when `text` is a quoted JSON string literal,
/// `None` when it is quoted but not a valid string literal, and the input
/// unchanged when it is not quoted at all.
pub fn unwrap_quoted(text: &str) -> Option<String> {
    let s = text.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return serde_json::from_str::<String>(s).ok();
    }
    Some(s.to_owned())
}

/// Pure, idempotent completeness check over the whole buffer.
pub fn is_complete(text: &str) -> bool {
    let s = text.trim();
    if s.is_empty() {
        return false;
    }
    let Some(unwrapped) = unwrap_quoted(s) else {
        return false;
    };
    braces_balanced(unwrapped.trim())
}

fn braces_balanced(s: &str) -> bool {
    if !(s.starts_with('{') && s.ends_with('}')) {
        return false;
    }

    let mut depth: i32 = 0;
    let mut in_str = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_str = !in_str,
            _ if in_str => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
