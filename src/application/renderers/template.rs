//! `builder` renderer: embeds a page-builder template by id.
//!
//! Every failure mode produces a short message instead of an error so the
//! surrounding page still renders.

use tracing::{debug, warn};

use super::{base_defaults, finish_html, positive_id};
use crate::application::dispatch::Renderer;
use crate::application::output::{Profile, wrap_output};
use crate::application::repos::ShortcodeExpander;
use crate::application::resolver::handlers::loaded;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;

pub const TEMPLATE_GROUP: &str = "templates";
pub const TEMPLATE_POST_TYPE: &str = "builder_template";
pub const TEMPLATE_KIND_META: &str = "_builder_template_type";
pub const TEMPLATE_CACHE_TTL: u64 = 600;
pub const BUILDER_ASSET: &str = "weft-builder-frontend";

const INACTIVE: &str = "Page builder is not active.";
const MISSING_ID: &str = "Missing or invalid \"id\" attribute.";
const NOT_FOUND: &str = "Template not found.";
const WRONG_TYPE: &str = "The provided ID is not a page-builder template.";
const UNSUPPORTED_KIND: &str = "Unsupported page-builder template type.";
const RECURSIVE: &str = "Recursive rendering detected.";
const EMPTY: &str = "Template is empty or cannot be rendered.";
const FAILED: &str = "An error occurred while rendering the template.";

/// Cache key for one revision of a template.
pub fn template_cache_key(id: u64, modified_unix: i64, kind: &str) -> String {
    let kind = if kind.is_empty() { "na" } else { kind };
    format!("tpl_{id}_{modified_unix}_{kind}")
}

pub struct TemplateRenderer;

impl TemplateRenderer {
    fn message(text: &str, attributes: &AttributeMap, scope: &RenderScope<'_>) -> String {
        finish_html(text, attributes, scope, Profile::Post)
    }
}

impl Renderer for TemplateRenderer {
    fn type_tag(&self) -> &str {
        "builder"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("name", "template");
        defaults.insert("id", 0);
        defaults
    }

    fn render(&self, attributes: &AttributeMap, _content: &str, scope: &RenderScope<'_>) -> String {
        if !attributes.trimmed("name").eq_ignore_ascii_case("template") {
            return String::new();
        }

        let engine = scope.engine();
        let collaborators = engine.collaborators();
        if !collaborators.templates.is_active() {
            return Self::message(INACTIVE, attributes, scope);
        }

        let Some(id) = positive_id(attributes, "id") else {
            return Self::message(MISSING_ID, attributes, scope);
        };

        let Some(template) = loaded(collaborators.content.post(id), "post") else {
            return Self::message(NOT_FOUND, attributes, scope);
        };
        if template.post_type != TEMPLATE_POST_TYPE {
            return Self::message(WRONG_TYPE, attributes, scope);
        }

        scope.enqueue_asset(BUILDER_ASSET);

        let kind = template.meta_text(TEMPLATE_KIND_META).unwrap_or_default();
        if !matches!(kind.as_str(), "" | "section" | "page") {
            return Self::message(UNSUPPORTED_KIND, attributes, scope);
        }

        if scope.context().current_post == Some(id) {
            return Self::message(RECURSIVE, attributes, scope);
        }
        let Some(_guard) = scope.state().enter_template(id) else {
            warn!(
                op = "builder",
                target_module = "weft::application::renderers::template",
                template_id = id,
                "Template includes itself"
            );
            return Self::message(RECURSIVE, attributes, scope);
        };

        let modified = template
            .modified_at
            .map(|instant| instant.unix_timestamp())
            .unwrap_or(0);
        let key = template_cache_key(id, modified, &kind);
        let cache = engine.cache();
        if let Some(html) = cache.get::<String>(&key, TEMPLATE_GROUP) {
            debug!(op = "builder", template_id = id, "Serving cached template HTML");
            return wrap_output(&html, attributes);
        }

        let expander: &dyn ShortcodeExpander = scope;
        match collaborators.templates.render(id, expander) {
            Ok(html) => {
                let html = if kind == "section" && !html.is_empty() {
                    format!("<div class=\"weft-builder-section\">{html}</div>")
                } else {
                    html
                };
                if html.trim().is_empty() {
                    return Self::message(EMPTY, attributes, scope);
                }
                cache.set(&key, &html, TEMPLATE_CACHE_TTL, TEMPLATE_GROUP);
                wrap_output(&html, attributes)
            }
            Err(err) => {
                warn!(
                    op = "builder",
                    target_module = "weft::application::renderers::template",
                    template_id = id,
                    error = %err,
                    "Page-builder render failed"
                );
                Self::message(FAILED, attributes, scope)
            }
        }
    }
}
