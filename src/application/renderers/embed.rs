//! `embed` renderer: oEmbed markup for a URL, with link fallback.

use super::base_defaults;
use crate::application::dispatch::Renderer;
use crate::application::output::wrap_output;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::util::html::{clean_url, escape_html};

pub struct EmbedRenderer;

/// Plain anchor used when the provider has nothing and no fallback is set.
pub fn fallback_anchor(url: &str) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
        clean_url(url),
        escape_html(url)
    )
}

impl Renderer for EmbedRenderer {
    fn type_tag(&self) -> &str {
        "embed"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("url", "");
        defaults
    }

    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String {
        let url = attributes.trimmed("url");
        if url.is_empty() {
            return String::new();
        }

        let html = scope
            .engine()
            .collaborators()
            .embeds
            .oembed(&url)
            .filter(|html| !html.trim().is_empty())
            .unwrap_or_else(|| match attributes.text("fallback") {
                fallback if fallback.is_empty() => fallback_anchor(&url),
                fallback => fallback,
            });

        wrap_output(&html, attributes) + &scope.expand_text(content)
    }
}
