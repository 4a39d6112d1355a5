//! Small HTML helpers shared by the resolver handlers and renderers.

use lol_html::{RewriteStrSettings, comments, element, rewrite_str};
use tracing::warn;
use url::Url;

const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "ftp", "ftps"];

/// Escape text for use inside element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Remove every tag from `html`, keeping text content.
///
/// `script` and `style` elements are dropped together with their bodies and
/// comments are removed.
pub fn strip_tags(html: &str) -> String {
    if !html.contains('<') {
        return html.to_string();
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |el| {
                    let tag = el.tag_name();
                    if tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style") {
                        el.remove();
                    } else {
                        el.remove_and_keep_content();
                    }
                    Ok(())
                }),
                comments!("*", |comment| {
                    comment.remove();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    );

    match rewritten {
        Ok(text) => text,
        Err(err) => {
            warn!(
                op = "strip_tags",
                error = %err,
                "Failed to strip markup; dropping fragment"
            );
            String::new()
        }
    }
}

/// Normalise a URL for output in an `href`/`src` attribute.
///
/// Absolute URLs must use one of the allowed schemes, anything else
/// (`javascript:`, `data:`) yields an empty string. Relative references pass
/// through. The result is attribute-escaped.
pub fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return String::new();
    }

    match Url::parse(trimmed) {
        Ok(url) => {
            if ALLOWED_URL_SCHEMES.contains(&url.scheme()) {
                escape_html(trimmed)
            } else {
                String::new()
            }
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => escape_html(trimmed),
        Err(_) => String::new(),
    }
}

/// Host component of an absolute URL, lower-cased.
pub fn url_host(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}
