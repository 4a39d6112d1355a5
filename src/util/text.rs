//! Plain-text sanitizing helpers.

use super::html::strip_tags;

/// Strip markup, collapse whitespace runs to a single space and trim.
pub fn sanitize_text_field(input: &str) -> String {
    let stripped = strip_tags(input);
    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

/// Lower-case and keep only `[a-z0-9_-]`.
pub fn sanitize_key(input: &str) -> String {
    input
        .chars()
        .filter_map(|ch| {
            let lower = ch.to_ascii_lowercase();
            (lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '_' || lower == '-')
                .then_some(lower)
        })
        .collect()
}

/// Attribute-style boolean: `1`, `true`, `yes` and `on` (any case).
pub fn is_truthy(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Leading-integer parse: `" 42px"` is 42, anything unparsable is 0.
pub fn intval(input: &str) -> i64 {
    let trimmed = input.trim();
    let mut end = 0;
    for (idx, ch) in trimmed.char_indices() {
        if ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+')) {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().unwrap_or(0)
}

/// Upper-case the first character.
pub fn ucfirst(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first character of every whitespace-separated word.
pub fn ucwords(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_text_field_collapses_whitespace() {
        assert_eq!(
            sanitize_text_field("  <b>Hello</b>\n\t  world  "),
            "Hello world"
        );
    }

    #[test]
    fn sanitize_key_filters_characters() {
        assert_eq!(sanitize_key("Weft_Query-ABC 12!"), "weft_query-abc12");
    }

    #[test]
    fn intval_reads_leading_digits() {
        assert_eq!(intval("42px"), 42);
        assert_eq!(intval("-7"), -7);
        assert_eq!(intval("abc"), 0);
        assert_eq!(intval(""), 0);
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            assert!(is_truthy(value), "{value} should be truthy");
        }
        for value in ["0", "false", "", "no"] {
            assert!(!is_truthy(value), "{value} should be falsy");
        }
    }

    #[test]
    fn case_helpers() {
        assert_eq!(ucfirst("logout"), "Logout");
        assert_eq!(ucwords("hello big world"), "Hello Big World");
    }
}
