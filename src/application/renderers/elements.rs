//! Custom-element renderers: `<qr-code>` and `<spoiler-span>`.
//!
//! Both emit a web component and queue its script; the sanitizer profile
//! for each element keeps only the attributes the component reads.

use super::{base_defaults, finish_html};
use crate::application::dispatch::Renderer;
use crate::application::output::Profile;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::util::html::{escape_html, strip_tags};

pub const QR_SCRIPT: &str = "weft-qr-code";
pub const QR_ANIMATION_SCRIPT: &str = "weft-qr-animation";
pub const SPOILER_SCRIPT: &str = "weft-spoiler";

const DEFAULT_QR_SIZE: i64 = 200;

const SPOILER_ATTRIBUTES: [&str; 9] = [
    "scale",
    "min-velocity",
    "max-velocity",
    "particle-lifetime",
    "density",
    "reveal-duration",
    "spawn-stop-delay",
    "monitor-position",
    "fps",
];

fn push_attribute(parts: &mut Vec<String>, name: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        parts.push(format!("{name}=\"{}\"", escape_html(value)));
    }
}

pub struct QrRenderer;

impl Renderer for QrRenderer {
    fn type_tag(&self) -> &str {
        "qr"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("text", "");
        defaults.insert("size", DEFAULT_QR_SIZE);
        defaults.insert("class", "weft-qr");
        for key in [
            "style",
            "module_color",
            "position_ring_color",
            "position_center_color",
            "animation",
        ] {
            defaults.insert(key, "");
        }
        defaults
    }

    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String {
        let contents = match attributes.trimmed("text") {
            text if text.is_empty() => strip_tags(&scope.expand_text(content))
                .trim()
                .to_string(),
            text => text,
        };
        if contents.is_empty() {
            return String::new();
        }

        let animation = attributes.trimmed("animation");
        scope.enqueue_asset(QR_SCRIPT);
        if !animation.is_empty() {
            scope.enqueue_asset(QR_ANIMATION_SCRIPT);
        }

        let size = match attributes.int("size") {
            size if size > 0 => size,
            _ => DEFAULT_QR_SIZE,
        };
        let mut style = format!("width: {size}px; height: {size}px");
        let extra_style = attributes.trimmed("style");
        if !extra_style.is_empty() {
            style.push_str("; ");
            style.push_str(extra_style.trim_end_matches(';'));
        }

        let mut parts = Vec::new();
        push_attribute(&mut parts, "contents", &contents);
        push_attribute(&mut parts, "style", &style);
        push_attribute(&mut parts, "class", &attributes.text("class"));
        push_attribute(&mut parts, "module-color", &attributes.text("module_color"));
        push_attribute(
            &mut parts,
            "position-ring-color",
            &attributes.text("position_ring_color"),
        );
        push_attribute(
            &mut parts,
            "position-center-color",
            &attributes.text("position_center_color"),
        );
        push_attribute(&mut parts, "data-weft-qr-animation", &animation);

        let element = format!("<qr-code {}></qr-code>", parts.join(" "));
        finish_html(&element, attributes, scope, Profile::QrCode)
    }
}

pub struct SpoilerRenderer;

impl Renderer for SpoilerRenderer {
    fn type_tag(&self) -> &str {
        "spoiler"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        for key in SPOILER_ATTRIBUTES {
            defaults.insert(key, "");
        }
        defaults
    }

    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String {
        let inner = scope
            .engine()
            .sanitizer()
            .clean(&scope.expand_text(content));
        if inner.trim().is_empty() {
            return String::new();
        }

        scope.enqueue_asset(SPOILER_SCRIPT);

        let mut parts = Vec::new();
        for key in SPOILER_ATTRIBUTES {
            push_attribute(&mut parts, key, &attributes.text(key));
        }
        let open = if parts.is_empty() {
            "<spoiler-span>".to_string()
        } else {
            format!("<spoiler-span {}>", parts.join(" "))
        };

        let element = format!("{open}{inner}</spoiler-span>");
        finish_html(&element, attributes, scope, Profile::Spoiler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attribute_values_are_skipped() {
        let mut parts = Vec::new();
        push_attribute(&mut parts, "density", "  ");
        push_attribute(&mut parts, "fps", "30");
        push_attribute(&mut parts, "contents", "a\"b");
        assert_eq!(parts, vec!["fps=\"30\"", "contents=\"a&quot;b\""]);
    }
}
