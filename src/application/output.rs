//! Output wrapping and HTML sanitizing shared by every renderer.

use std::borrow::Cow;
use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;

use crate::domain::attributes::AttributeMap;

/// Sanitizer profiles. `Post` matches regular post markup; the others extend
/// it for one custom element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Post,
    QrCode,
    Spoiler,
}

pub struct Sanitizer {
    post: AmmoniaBuilder<'static>,
    qr_code: AmmoniaBuilder<'static>,
    spoiler: AmmoniaBuilder<'static>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            post: build_post_sanitizer(),
            qr_code: build_qr_sanitizer(),
            spoiler: build_spoiler_sanitizer(),
        }
    }

    pub fn clean(&self, html: &str) -> String {
        self.clean_as(Profile::Post, html)
    }

    pub fn clean_as(&self, profile: Profile, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }
        let builder = match profile {
            Profile::Post => &self.post,
            Profile::QrCode => &self.qr_code,
            Profile::Spoiler => &self.spoiler,
        };
        builder.clean(html).to_string()
    }
}

/// Apply `fallback` to an empty value, then surround with `before`/`after`.
/// A value that is still empty yields an empty string.
pub fn wrap_output(value: &str, attrs: &AttributeMap) -> String {
    let fallback = attrs.text("fallback");
    let value = if value.trim().is_empty() && !fallback.is_empty() {
        fallback.as_str()
    } else {
        value
    };

    if value.trim().is_empty() {
        return String::new();
    }

    format!("{}{}{}", attrs.text("before"), value, attrs.text("after"))
}

fn build_post_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a", "abbr", "article", "audio", "b", "blockquote", "br", "caption", "cite", "code",
        "del", "div", "dd", "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4",
        "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "s",
        "section", "small", "source", "span", "strong", "sub", "sup", "table", "tbody", "td",
        "tfoot", "th", "thead", "time", "tr", "track", "u", "ul", "video",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
    ]);
    builder.generic_attributes(generic);
    builder.add_generic_attribute_prefixes(&["data-"]);

    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes(
        "img",
        &["width", "height", "alt", "loading", "decoding", "srcset", "sizes"],
    );
    builder.add_tag_attributes(
        "video",
        &[
            "src",
            "poster",
            "width",
            "height",
            "controls",
            "autoplay",
            "loop",
            "muted",
            "playsinline",
            "preload",
        ],
    );
    builder.add_tag_attributes(
        "audio",
        &["src", "controls", "autoplay", "loop", "muted", "preload"],
    );
    builder.add_tag_attributes("source", &["src", "type"]);
    builder.add_tag_attributes("track", &["src", "kind", "srclang", "label"]);
    builder.add_tag_attributes("time", &["datetime"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);

    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder
}

fn build_qr_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = build_post_sanitizer();
    builder.add_tags(&["qr-code"]);
    builder.add_tag_attributes(
        "qr-code",
        &[
            "contents",
            "style",
            "module-color",
            "position-ring-color",
            "position-center-color",
        ],
    );
    builder.attribute_filter(|element, attribute, value| {
        if element == "qr-code" && attribute == "style" {
            sanitize_style_attribute(value).map(Cow::Owned)
        } else {
            Some(Cow::Borrowed(value))
        }
    });
    builder
}

fn build_spoiler_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = build_post_sanitizer();
    builder.add_tags(&["spoiler-span"]);
    builder.add_tag_attributes(
        "spoiler-span",
        &[
            "scale",
            "min-velocity",
            "max-velocity",
            "particle-lifetime",
            "density",
            "reveal-duration",
            "spawn-stop-delay",
            "monitor-position",
            "fps",
        ],
    );
    builder
}

/// Keep only declarations that cannot reach script or external stylesheets.
pub(crate) fn sanitize_style_attribute(value: &str) -> Option<String> {
    let kept: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty() && is_safe_style_declaration(decl))
        .collect();

    (!kept.is_empty()).then(|| kept.join("; "))
}

fn is_safe_style_declaration(decl: &str) -> bool {
    const FORBIDDEN_SUBSTRINGS: [&str; 8] = [
        "expression(",
        "javascript:",
        "vbscript:",
        "-moz-binding",
        "behavior:",
        "behaviour:",
        "@import",
        "url(",
    ];

    let lower = decl.to_ascii_lowercase();
    !FORBIDDEN_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_output_applies_fallback_then_wrappers() {
        let attrs: AttributeMap = [("before", "<b>"), ("after", "</b>"), ("fallback", "none")]
            .into_iter()
            .collect();
        assert_eq!(wrap_output("", &attrs), "<b>none</b>");
        assert_eq!(wrap_output("value", &attrs), "<b>value</b>");
    }

    #[test]
    fn wrap_output_drops_wrappers_for_empty_values() {
        let attrs: AttributeMap = [("before", "<b>"), ("after", "</b>")].into_iter().collect();
        assert_eq!(wrap_output("  ", &attrs), "");
    }

    #[test]
    fn post_profile_strips_scripts_and_handlers() {
        let sanitizer = Sanitizer::new();
        let html = sanitizer.clean(r#"<p onclick="x()">Hi<script>alert(1)</script></p>"#);
        assert_eq!(html, "<p>Hi</p>");
    }

    #[test]
    fn post_profile_keeps_media_elements() {
        let sanitizer = Sanitizer::new();
        let html = sanitizer.clean(
            r#"<video class="weft-video" src="https://cdn.example.com/a.mp4" controls preload="metadata"></video>"#,
        );
        assert!(html.contains("<video"));
        assert!(html.contains(r#"preload="metadata""#));
        assert!(html.contains("controls"));
    }

    #[test]
    fn custom_elements_need_their_profile() {
        let sanitizer = Sanitizer::new();
        let markup = r#"<qr-code contents="hello" module-color="red"></qr-code>"#;
        assert!(!sanitizer.clean(markup).contains("qr-code"));
        let kept = sanitizer.clean_as(Profile::QrCode, markup);
        assert!(kept.contains(r#"<qr-code contents="hello" module-color="red">"#));
    }

    #[test]
    fn qr_style_is_filtered() {
        let sanitizer = Sanitizer::new();
        let html = sanitizer.clean_as(
            Profile::QrCode,
            r#"<qr-code style="width: 10px; background: url(javascript:alert(1))"></qr-code>"#,
        );
        assert!(html.contains(r#"style="width: 10px""#));
        assert!(!html.contains("javascript"));
    }
}
