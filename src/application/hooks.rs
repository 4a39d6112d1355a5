//! Extension points fired around each dispatch.
//!
//! Observers see the invocation; filters may rewrite attributes or output.
//! Every registration is either global (`None`) or scoped to one type tag,
//! and global entries always run before type-scoped ones.

use std::sync::Arc;

use crate::domain::attributes::AttributeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    BeforeNormalize,
    AfterNormalize,
    BeforeOutput,
    AfterOutput,
    /// No renderer is registered for the requested type.
    Missing,
}

/// What an observer sees.
pub struct HookEvent<'a> {
    pub point: HookPoint,
    pub type_tag: &'a str,
    pub attributes: &'a AttributeMap,
    pub content: &'a str,
}

pub type Observer = Arc<dyn Fn(&HookEvent<'_>) + Send + Sync>;
pub type AttributeFilter = Arc<dyn Fn(AttributeMap, &str) -> AttributeMap + Send + Sync>;
pub type OutputFilter = Arc<dyn Fn(String, &AttributeMap, &str) -> String + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    observers: Vec<(Option<String>, (HookPoint, Observer))>,
    attribute_filters: Vec<(Option<String>, AttributeFilter)>,
    output_filters: Vec<(Option<String>, OutputFilter)>,
}

fn scope_key(type_tag: Option<&str>) -> Option<String> {
    type_tag.map(|tag| tag.trim().to_ascii_lowercase())
}

fn global<T>(entries: &[(Option<String>, T)]) -> impl Iterator<Item = &T> {
    entries
        .iter()
        .filter(|(scope, _)| scope.is_none())
        .map(|(_, entry)| entry)
}

fn scoped<'h, T>(entries: &'h [(Option<String>, T)], type_tag: &'h str) -> impl Iterator<Item = &'h T> {
    entries
        .iter()
        .filter(move |(scope, _)| scope.as_deref() == Some(type_tag))
        .map(|(_, entry)| entry)
}

impl Hooks {
    pub fn observe(&mut self, point: HookPoint, type_tag: Option<&str>, observer: Observer) {
        self.observers.push((scope_key(type_tag), (point, observer)));
    }

    pub fn filter_attributes(&mut self, type_tag: Option<&str>, filter: AttributeFilter) {
        self.attribute_filters.push((scope_key(type_tag), filter));
    }

    pub fn filter_output(&mut self, type_tag: Option<&str>, filter: OutputFilter) {
        self.output_filters.push((scope_key(type_tag), filter));
    }

    pub(crate) fn fire(
        &self,
        point: HookPoint,
        type_tag: &str,
        attributes: &AttributeMap,
        content: &str,
    ) {
        let event = HookEvent {
            point,
            type_tag,
            attributes,
            content,
        };
        global(&self.observers)
            .chain(scoped(&self.observers, type_tag))
            .filter(|(at, _)| *at == point)
            .for_each(|(_, observer)| observer(&event));
    }

    /// Global filters run first and may set or change `type`; type-scoped
    /// filters then key on the resulting tag.
    pub(crate) fn apply_attribute_filters(
        &self,
        attributes: AttributeMap,
        content: &str,
    ) -> AttributeMap {
        let filtered = global(&self.attribute_filters)
            .fold(attributes, |attrs, filter| filter(attrs, content));
        let type_tag = filtered.type_tag().unwrap_or_default();
        scoped(&self.attribute_filters, &type_tag)
            .fold(filtered, |attrs, filter| filter(attrs, content))
    }

    pub(crate) fn apply_output_filters(
        &self,
        output: String,
        type_tag: &str,
        attributes: &AttributeMap,
        content: &str,
    ) -> String {
        global(&self.output_filters)
            .chain(scoped(&self.output_filters, type_tag))
            .fold(output, |html, filter| filter(html, attributes, content))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn global_observers_fire_before_scoped_ones() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();

        let sink = Arc::clone(&order);
        hooks.observe(
            HookPoint::BeforeOutput,
            Some("option"),
            Arc::new(move |_: &HookEvent<'_>| sink.lock().expect("order").push("scoped")),
        );
        let sink = Arc::clone(&order);
        hooks.observe(
            HookPoint::BeforeOutput,
            None,
            Arc::new(move |_: &HookEvent<'_>| sink.lock().expect("order").push("global")),
        );
        let sink = Arc::clone(&order);
        hooks.observe(
            HookPoint::AfterOutput,
            None,
            Arc::new(move |_: &HookEvent<'_>| sink.lock().expect("order").push("after")),
        );

        hooks.fire(HookPoint::BeforeOutput, "option", &AttributeMap::new(), "");
        hooks.fire(HookPoint::BeforeOutput, "link", &AttributeMap::new(), "");

        assert_eq!(
            *order.lock().expect("order"),
            vec!["global", "scoped", "global"]
        );
    }

    #[test]
    fn attribute_filters_can_retarget_type() {
        let mut hooks = Hooks::default();
        hooks.filter_attributes(
            None,
            Arc::new(|mut attrs: AttributeMap, _: &str| {
                if attrs.trimmed("type") == "legacy-option" {
                    attrs.insert("type", "option");
                }
                attrs
            }),
        );
        hooks.filter_attributes(
            Some("option"),
            Arc::new(|mut attrs: AttributeMap, _: &str| {
                attrs.insert("fallback", "n/a");
                attrs
            }),
        );

        let attrs: AttributeMap = [("type", "legacy-option")].into_iter().collect();
        let filtered = hooks.apply_attribute_filters(attrs, "");
        assert_eq!(filtered.text("type"), "option");
        assert_eq!(filtered.text("fallback"), "n/a");
    }

    #[test]
    fn output_filters_chain() {
        let mut hooks = Hooks::default();
        hooks.filter_output(None, Arc::new(|html: String, _: &AttributeMap, _: &str| format!("[{html}]")));
        hooks.filter_output(Some("link"), Arc::new(|html: String, _: &AttributeMap, _: &str| {
            html.to_uppercase()
        }));

        let attrs = AttributeMap::new();
        assert_eq!(hooks.apply_output_filters("a".into(), "link", &attrs, ""), "[A]");
        assert_eq!(hooks.apply_output_filters("a".into(), "qr", &attrs, ""), "[a]");
    }
}
