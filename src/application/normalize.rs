//! Attribute normalization run before every render.

use super::hooks::HookPoint;
use super::resolver::Memo;
use super::scope::RenderScope;
use crate::domain::attributes::{AttrValue, AttributeMap};

/// Merge renderer defaults and resolve every textual value.
///
/// All values of one map share a resolution cache. After directive
/// resolution, a value that starts with `sc:` or `fn:` is evaluated as a
/// shortcode or function call.
pub(crate) fn normalize(
    attributes: AttributeMap,
    defaults: &AttributeMap,
    type_tag: &str,
    content: &str,
    scope: &RenderScope<'_>,
) -> AttributeMap {
    let hooks = scope.engine().hooks();
    hooks.fire(HookPoint::BeforeNormalize, type_tag, &attributes, content);

    let mut merged = attributes.with_defaults(defaults);
    let mut memo = Memo::new();
    for value in merged.values_mut() {
        resolve_value(value, scope, &mut memo);
    }

    hooks.fire(HookPoint::AfterNormalize, type_tag, &merged, content);
    merged
}

fn resolve_value(value: &mut AttrValue, scope: &RenderScope<'_>, memo: &mut Memo) {
    match value {
        AttrValue::Text(text) => *text = resolve_text(text, scope, memo),
        AttrValue::List(items) => {
            for item in items {
                resolve_value(item, scope, memo);
            }
        }
        AttrValue::Bool(_) | AttrValue::Int(_) => {}
    }
}

fn resolve_text(text: &str, scope: &RenderScope<'_>, memo: &mut Memo) -> String {
    let resolver = scope.engine().resolver();
    let resolved = if text.contains('{') {
        resolver.resolve(text, scope, memo)
    } else {
        text.to_string()
    };

    let (alias, rest) = match prefixed(&resolved) {
        Some(found) => found,
        None => return resolved,
    };
    resolver.call(alias, rest, scope).unwrap_or_default()
}

fn prefixed(value: &str) -> Option<(&'static str, &str)> {
    let trimmed = value.trim_start();
    let head = trimmed.get(..3)?;
    let alias = if head.eq_ignore_ascii_case("sc:") {
        "sc"
    } else if head.eq_ignore_ascii_case("fn:") {
        "fn"
    } else {
        return None;
    };
    Some((alias, &trimmed[3..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_case_insensitive() {
        assert_eq!(prefixed(" SC:weft type=x"), Some(("sc", "weft type=x")));
        assert_eq!(prefixed("fn:date, Y"), Some(("fn", "date, Y")));
        assert_eq!(prefixed("scope"), None);
        assert_eq!(prefixed("é"), None);
    }
}
