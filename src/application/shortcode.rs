//! Host shortcode syntax: `[tag attr="v"]`, `[tag .../]`, `[tag]...[/tag]`.
//!
//! Enclosing content runs to the first matching close tag, so same-tag
//! nesting is only possible with self-closing inner tags. `[[tag]]` is an
//! escaped literal and renders as `[tag]`.

use crate::domain::attributes::AttributeMap;

/// Replace every `tag` shortcode in `text` with `render(attributes, content)`.
pub fn expand_shortcodes<F>(text: &str, tag: &str, render: F) -> String
where
    F: FnMut(AttributeMap, &str) -> String,
{
    expand_segments(text, tag, str::to_string, render)
}

/// Like [`expand_shortcodes`], but every run of text between shortcodes is
/// passed through `literal` first. Shortcode attributes, enclosed content and
/// escaped tags are never seen by `literal`.
pub fn expand_segments<L, F>(text: &str, tag: &str, mut literal: L, mut render: F) -> String
where
    L: FnMut(&str) -> String,
    F: FnMut(AttributeMap, &str) -> String,
{
    let open = format!("[{tag}");
    let close = format!("[/{tag}]");
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut rest = text;

    while let Some(start) = rest.find('[') {
        pending.push_str(&rest[..start]);
        let candidate = &rest[start..];

        if let Some(end) = escaped_len(candidate, tag) {
            flush_literal(&mut out, &mut pending, &mut literal);
            out.push_str(&candidate[1..end - 1]);
            rest = &candidate[end..];
            continue;
        }

        let Some(after_name) = candidate
            .strip_prefix(open.as_str())
            .filter(|tail| tag_boundary(tail))
        else {
            pending.push('[');
            rest = &candidate[1..];
            continue;
        };

        let Some(close_at) = opening_tag_end(after_name) else {
            pending.push('[');
            rest = &candidate[1..];
            continue;
        };

        let raw = after_name[..close_at].trim_end();
        let (raw, self_closing) = match raw.strip_suffix('/') {
            Some(raw) => (raw, true),
            None => (raw, false),
        };
        let mut tail = &after_name[close_at + 1..];

        let content = if self_closing {
            ""
        } else {
            match tail.find(close.as_str()) {
                Some(end) => {
                    let content = &tail[..end];
                    tail = &tail[end + close.len()..];
                    content
                }
                None => "",
            }
        };

        flush_literal(&mut out, &mut pending, &mut literal);
        out.push_str(&render(parse_attributes(raw), content));
        rest = tail;
    }

    pending.push_str(rest);
    flush_literal(&mut out, &mut pending, &mut literal);
    out
}

fn flush_literal<L>(out: &mut String, pending: &mut String, literal: &mut L)
where
    L: FnMut(&str) -> String,
{
    if !pending.is_empty() {
        out.push_str(&literal(pending));
        pending.clear();
    }
}

/// Split a loop body on `[tag else]` into the item and empty-state templates.
pub fn split_else<'a>(content: &'a str, tag: &str) -> (&'a str, &'a str) {
    let marker = format!("[{tag} else]");
    match content.find(marker.as_str()) {
        Some(at) => (&content[..at], &content[at + marker.len()..]),
        None => (content, ""),
    }
}

/// Parse `name="v" name='v' name=v positional` into an attribute map.
/// Positional values are keyed `0`, `1`, ...
pub fn parse_attributes(raw: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    let mut positional = 0usize;
    let source = raw.trim();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '"' || ch == '\'' {
            chars.next();
            let value = take_quoted(source, &mut chars, ch);
            attrs.insert(positional.to_string(), value);
            positional += 1;
            continue;
        }

        let mut end = start;
        while let Some(&(idx, next)) = chars.peek() {
            if next.is_whitespace() || next == '=' {
                break;
            }
            end = idx + next.len_utf8();
            chars.next();
        }
        let word = &source[start..end];

        if matches!(chars.peek(), Some(&(_, '='))) {
            chars.next();
            let value = match chars.peek() {
                Some(&(_, quote @ ('"' | '\''))) => {
                    chars.next();
                    take_quoted(source, &mut chars, quote)
                }
                Some(&(value_start, _)) => {
                    let mut value_end = value_start;
                    while let Some(&(idx, next)) = chars.peek() {
                        if next.is_whitespace() {
                            break;
                        }
                        value_end = idx + next.len_utf8();
                        chars.next();
                    }
                    source[value_start..value_end].to_string()
                }
                None => String::new(),
            };
            attrs.insert(word, value);
        } else if !word.is_empty() {
            attrs.insert(positional.to_string(), word);
            positional += 1;
        }
    }

    attrs
}

fn take_quoted(
    source: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
) -> String {
    let Some(&(start, _)) = chars.peek() else {
        return String::new();
    };
    for (idx, ch) in chars.by_ref() {
        if ch == quote {
            return source[start..idx].to_string();
        }
    }
    source[start..].to_string()
}

fn tag_boundary(tail: &str) -> bool {
    tail.chars()
        .next()
        .is_some_and(|ch| ch.is_whitespace() || ch == ']' || ch == '/')
}

/// Byte length of an escaped `[[tag ...]]` at the start of `candidate`.
fn escaped_len(candidate: &str, tag: &str) -> Option<usize> {
    let inner = candidate.strip_prefix("[[")?;
    let after = inner.strip_prefix(tag)?;
    if !tag_boundary(after) {
        return None;
    }
    let end = candidate.find("]]")?;
    Some(end + 2)
}

/// Index of the `]` that ends the opening tag, skipping quoted values.
fn opening_tag_end(after_name: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in after_name.char_indices() {
        match (quote, ch) {
            (Some(open), ch) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, ']') => return Some(idx),
            (None, '[') => return None,
            (None, _) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(text: &str) -> String {
        expand_shortcodes(text, "weft", |attrs, content| {
            let pairs: Vec<String> = attrs
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            format!("<{}|{}>", pairs.join(","), content)
        })
    }

    #[test]
    fn parses_every_attribute_form() {
        let attrs = parse_attributes(r#"type="option" Name='blogname' fallback=none flag "quoted pos""#);
        assert_eq!(attrs.text("type"), "option");
        assert_eq!(attrs.text("name"), "blogname");
        assert_eq!(attrs.text("fallback"), "none");
        assert_eq!(attrs.text("0"), "flag");
        assert_eq!(attrs.text("1"), "quoted pos");
    }

    #[test]
    fn self_closing_and_enclosing_forms() {
        assert_eq!(echo(r#"a [weft type="x"/] b"#), "a <type=x|> b");
        assert_eq!(echo(r#"[weft type="x"]inner[/weft]!"#), "<type=x|inner>!");
        assert_eq!(echo(r#"[weft type="x"] tail"#), "<type=x|> tail");
    }

    #[test]
    fn enclosing_content_stops_at_first_close() {
        assert_eq!(
            echo("[weft type=loop]item [weft else] none[/weft] after"),
            "<type=loop|item [weft else] none> after"
        );
    }

    #[test]
    fn escaped_and_foreign_tags_are_literal() {
        assert_eq!(echo("[[weft type=x]]"), "[weft type=x]");
        assert_eq!(echo("[weftx] [gallery] [x"), "[weftx] [gallery] [x");
    }

    #[test]
    fn brackets_inside_quotes_do_not_close_the_tag() {
        assert_eq!(echo(r#"[weft fallback="a]b"/]"#), "<fallback=a]b|>");
    }

    #[test]
    fn literal_runs_are_transformed_around_shortcodes() {
        let out = expand_segments(
            r#"{a} [weft type="x" v="{b}"]{c}[/weft] [[weft {d}]] {e"#,
            "weft",
            |text| text.to_uppercase(),
            |attrs, content| format!("<{}|{}>", attrs.text("v"), content),
        );
        assert_eq!(out, "{A} <{b}|{c}> [weft {d}] {E");
    }

    #[test]
    fn literal_runs_keep_plain_brackets_together() {
        let mut seen = Vec::new();
        expand_segments(
            "x[0] and [gallery]",
            "weft",
            |text| {
                seen.push(text.to_string());
                text.to_string()
            },
            |_, _| String::new(),
        );
        assert_eq!(seen, vec!["x[0] and [gallery]"]);
    }

    #[test]
    fn split_else_separates_templates() {
        assert_eq!(split_else("item [weft else] none", "weft"), ("item ", " none"));
        assert_eq!(split_else("item only", "weft"), ("item only", ""));
    }
}
