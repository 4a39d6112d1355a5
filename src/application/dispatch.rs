//! Renderer registry and the dispatch pipeline.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use metrics::counter;
use tracing::{debug, warn};

use super::hooks::HookPoint;
use super::normalize::normalize;
use super::scope::RenderScope;
use crate::domain::attributes::AttributeMap;

const METRIC_UNKNOWN_TYPE: &str = "weft_render_unknown_type_total";
const METRIC_RENDERED: &str = "weft_render_total";

/// One `type` of shortcode output.
pub trait Renderer: Send + Sync {
    fn type_tag(&self) -> &str;

    /// Attribute defaults merged under the caller's attributes.
    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        AttributeMap::new()
    }

    /// Produce final HTML from normalized attributes.
    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String;
}

pub type RendererFactory = Arc<dyn Fn() -> Box<dyn Renderer> + Send + Sync>;

struct RegistryEntry {
    factory: RendererFactory,
    instance: OnceLock<Box<dyn Renderer>>,
}

impl RegistryEntry {
    fn renderer(&self) -> &dyn Renderer {
        self.instance.get_or_init(|| (self.factory)()).as_ref()
    }
}

/// Type tag to renderer. Instances are built on first use and then shared.
#[derive(Default)]
pub struct RendererRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `type_tag`, replacing any earlier renderer for it.
    pub fn register(&mut self, type_tag: &str, factory: RendererFactory) {
        self.entries.insert(
            type_tag.trim().to_ascii_lowercase(),
            RegistryEntry {
                factory,
                instance: OnceLock::new(),
            },
        );
    }

    pub fn get(&self, type_tag: &str) -> Option<&dyn Renderer> {
        self.entries
            .get(&type_tag.trim().to_ascii_lowercase())
            .map(RegistryEntry::renderer)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.entries
            .contains_key(&type_tag.trim().to_ascii_lowercase())
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Wrap a constructor as a [`RendererFactory`].
pub fn factory<R, F>(build: F) -> RendererFactory
where
    R: Renderer + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    Arc::new(move || Box::new(build()) as Box<dyn Renderer>)
}

/// Run one invocation through filters, normalization, the renderer and
/// output filters.
pub(crate) fn dispatch(scope: &RenderScope<'_>, attributes: AttributeMap, content: &str) -> String {
    let engine = scope.engine();
    let hooks = engine.hooks();

    let attributes = hooks.apply_attribute_filters(attributes, content);
    let Some(type_tag) = attributes.type_tag() else {
        debug!(op = "dispatch", "Shortcode without type ignored");
        return String::new();
    };

    let Some(renderer) = engine.renderers().get(&type_tag) else {
        counter!(METRIC_UNKNOWN_TYPE).increment(1);
        warn!(
            op = "dispatch",
            target_module = "weft::application::dispatch",
            type_tag = %type_tag,
            "No renderer registered for type"
        );
        hooks.fire(HookPoint::Missing, &type_tag, &attributes, content);
        return String::new();
    };

    hooks.fire(HookPoint::BeforeOutput, &type_tag, &attributes, content);

    let defaults = renderer.defaults(scope);
    let attributes = normalize(attributes, &defaults, &type_tag, content, scope);
    let output = renderer.render(&attributes, content, scope);

    hooks.fire(HookPoint::AfterOutput, &type_tag, &attributes, content);
    counter!(METRIC_RENDERED, "type" => type_tag.clone()).increment(1);

    hooks.apply_output_filters(output, &type_tag, &attributes, content)
}
