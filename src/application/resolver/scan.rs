//! Locates `{alias:param}` directives in text.

/// One directive occurrence; offsets are byte positions into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Directive<'a> {
    pub start: usize,
    pub end: usize,
    pub alias: &'a str,
    pub param: &'a str,
}

impl<'a> Directive<'a> {
    pub fn text(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

const MIN_ALIAS_LEN: usize = 2;

/// First complete directive at or after `from`.
///
/// The alias is `[A-Za-z_]{2,}`; the parameter runs to the `}` that balances
/// the opening brace. An opening brace with no balancing close is literal.
pub(crate) fn next_directive(text: &str, from: usize) -> Option<Directive<'_>> {
    let bytes = text.as_bytes();
    let mut cursor = from;

    while let Some(offset) = text.get(cursor..)?.find('{') {
        let start = cursor + offset;
        if let Some(directive) = directive_at(text, bytes, start) {
            return Some(directive);
        }
        cursor = start + 1;
    }
    None
}

fn directive_at<'a>(text: &'a str, bytes: &[u8], start: usize) -> Option<Directive<'a>> {
    let alias_start = start + 1;
    let alias_len = bytes[alias_start..]
        .iter()
        .take_while(|byte| byte.is_ascii_alphabetic() || **byte == b'_')
        .count();
    if alias_len < MIN_ALIAS_LEN {
        return None;
    }

    let colon = alias_start + alias_len;
    if bytes.get(colon) != Some(&b':') {
        return None;
    }

    let param_start = colon + 1;
    let mut depth = 1usize;
    for (index, byte) in bytes[param_start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let close = param_start + index;
                    return Some(Directive {
                        start,
                        end: close + 1,
                        alias: &text[alias_start..colon],
                        param: &text[param_start..close],
                    });
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(text: &str) -> Vec<(&str, &str)> {
        let mut found = Vec::new();
        let mut cursor = 0;
        while let Some(directive) = next_directive(text, cursor) {
            found.push((directive.alias, directive.param));
            cursor = directive.end;
        }
        found
    }

    #[test]
    fn finds_simple_directives() {
        assert_eq!(
            all("Hi {get:name}, see {url:home}"),
            vec![("get", "name"), ("url", "home")]
        );
    }

    #[test]
    fn parameters_balance_nested_braces() {
        let text = "{fn:strtoupper, {get:name}} tail";
        let directive = next_directive(text, 0).expect("directive");
        assert_eq!(directive.alias, "fn");
        assert_eq!(directive.param, "strtoupper, {get:name}");
        assert_eq!(directive.text(text), "{fn:strtoupper, {get:name}}");
    }

    #[test]
    fn short_aliases_and_json_are_not_directives() {
        assert!(all(r#"{x:1} {"key":1} {:empty}"#).is_empty());
    }

    #[test]
    fn unterminated_outer_still_exposes_inner() {
        assert_eq!(all("{get:{op:title}"), vec![("op", "title")]);
    }

    #[test]
    fn multibyte_text_is_safe() {
        assert_eq!(all("été {get:q} ✓"), vec![("get", "q")]);
    }
}
