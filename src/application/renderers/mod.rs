//! Built-in renderers, one per `type` tag.

pub mod content_loop;
pub mod elements;
pub mod embed;
pub mod fields;
pub mod function;
pub mod link;
pub mod media;
pub mod template;

use serde_json::Value;

use super::dispatch::{RendererRegistry, factory};
use super::format::format_value;
use super::output::{Profile, wrap_output};
use super::scope::RenderScope;
use crate::domain::attributes::AttributeMap;

use self::content_loop::LoopRenderer;
use self::elements::{QrRenderer, SpoilerRenderer};
use self::embed::EmbedRenderer;
use self::fields::{FieldRenderer, FieldSource};
use self::function::FunctionRenderer;
use self::link::LinkRenderer;
use self::media::{MediaKind, MediaRenderer};
use self::template::TemplateRenderer;

pub(crate) fn register_builtins(registry: &mut RendererRegistry) {
    for source in FieldSource::ALL {
        registry.register(source.type_tag(), factory(move || FieldRenderer::new(source)));
    }
    registry.register("function", factory(|| FunctionRenderer));
    registry.register("link", factory(|| LinkRenderer));
    registry.register("audio", factory(|| MediaRenderer::new(MediaKind::Audio)));
    registry.register("video", factory(|| MediaRenderer::new(MediaKind::Video)));
    registry.register("loop", factory(|| LoopRenderer));
    registry.register("builder", factory(|| TemplateRenderer));
    registry.register("qr", factory(|| QrRenderer));
    registry.register("spoiler", factory(|| SpoilerRenderer));
    registry.register("embed", factory(|| EmbedRenderer));
}

/// Wrapper attributes every renderer accepts.
pub(crate) fn base_defaults() -> AttributeMap {
    [("before", ""), ("after", ""), ("fallback", ""), ("format", "")]
        .into_iter()
        .collect()
}

/// Format, wrap and sanitize a raw value.
pub(crate) fn finish_value(value: &Value, attributes: &AttributeMap, scope: &RenderScope<'_>) -> String {
    let engine = scope.engine();
    let formatted = format_value(value, attributes, engine.formats(), engine.timezone());
    engine.sanitizer().clean(&wrap_output(&formatted, attributes))
}

/// Wrap and sanitize markup a renderer built itself.
pub(crate) fn finish_html(
    html: &str,
    attributes: &AttributeMap,
    scope: &RenderScope<'_>,
    profile: Profile,
) -> String {
    scope
        .engine()
        .sanitizer()
        .clean_as(profile, &wrap_output(html, attributes))
}

/// Positive numeric id from an attribute, if any.
pub(crate) fn positive_id(attributes: &AttributeMap, key: &str) -> Option<u64> {
    u64::try_from(attributes.int(key)).ok().filter(|id| *id > 0)
}
