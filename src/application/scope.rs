//! Per-request rendering scope.
//!
//! A [`RenderScope`] pairs the immutable [`Engine`] with one request and the
//! mutable bookkeeping for that request: nesting depth, the page-builder
//! templates currently on the stack and the queued assets. It never crosses
//! threads.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use tracing::warn;

use super::dispatch;
use super::engine::Engine;
use super::repos::ShortcodeExpander;
use super::resolver::Memo;
use super::shortcode::{expand_segments, expand_shortcodes};
use crate::domain::attributes::AttributeMap;
use crate::domain::context::RequestContext;

pub struct RenderState {
    depth: Cell<usize>,
    max_depth: usize,
    templates: RefCell<Vec<u64>>,
    assets: RefCell<BTreeSet<String>>,
}

impl RenderState {
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: Cell::new(0),
            max_depth,
            templates: RefCell::new(Vec::new()),
            assets: RefCell::new(BTreeSet::new()),
        }
    }

    /// One level deeper, or `None` once the budget is spent.
    pub fn enter(&self) -> Option<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return None;
        }
        self.depth.set(depth + 1);
        Some(DepthGuard { depth: &self.depth })
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Push template `id`, or `None` if it is already being rendered.
    pub fn enter_template(&self, id: u64) -> Option<TemplateGuard<'_>> {
        let mut stack = self.templates.borrow_mut();
        if stack.contains(&id) {
            return None;
        }
        stack.push(id);
        Some(TemplateGuard {
            stack: &self.templates,
        })
    }

    pub fn enqueue_asset(&self, handle: &str) {
        self.assets.borrow_mut().insert(handle.to_string());
    }

    pub fn assets(&self) -> Vec<String> {
        self.assets.borrow().iter().cloned().collect()
    }
}

pub struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

pub struct TemplateGuard<'a> {
    stack: &'a RefCell<Vec<u64>>,
}

impl Drop for TemplateGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[derive(Clone, Copy)]
pub struct RenderScope<'a> {
    engine: &'a Engine,
    context: &'a RequestContext,
    state: &'a RenderState,
}

impl<'a> RenderScope<'a> {
    pub fn new(engine: &'a Engine, context: &'a RequestContext, state: &'a RenderState) -> Self {
        Self {
            engine,
            context,
            state,
        }
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn context(&self) -> &'a RequestContext {
        self.context
    }

    pub fn state(&self) -> &'a RenderState {
        self.state
    }

    /// Same engine and request state, different request view.
    pub fn with_context<'b>(&self, context: &'b RequestContext) -> RenderScope<'b>
    where
        'a: 'b,
    {
        RenderScope {
            engine: self.engine,
            context,
            state: self.state,
        }
    }

    /// Nested dispatch; counts against the depth budget.
    pub fn dispatch(&self, attributes: AttributeMap, content: &str) -> String {
        let Some(_guard) = self.state.enter() else {
            warn!(
                op = "dispatch",
                target_module = "weft::application::scope",
                max_depth = self.engine.limits().max_depth,
                "Nesting limit reached; dropping nested render"
            );
            return String::new();
        };
        dispatch::dispatch(self, attributes, content)
    }

    /// Resolve `{alias:param}` directives with a fresh resolution cache.
    pub fn resolve_text(&self, text: &str) -> String {
        let mut memo = Memo::new();
        self.engine.resolver().resolve(text, self, &mut memo)
    }

    /// Expand `[tag ...]` shortcodes only.
    pub fn expand_shortcodes(&self, text: &str) -> String {
        expand_shortcodes(text, self.engine.shortcode_tag(), |attributes, content| {
            self.dispatch(attributes, content)
        })
    }

    /// Shortcodes, with directives resolved in the text between them.
    ///
    /// Attributes and enclosed content reach the renderer unresolved, so
    /// they are resolved against whatever context that renderer sets up.
    pub fn expand_text(&self, text: &str) -> String {
        let mut memo = Memo::new();
        expand_segments(
            text,
            self.engine.shortcode_tag(),
            |literal| self.engine.resolver().resolve(literal, self, &mut memo),
            |attributes, content| self.dispatch(attributes, content),
        )
    }

    /// Queue a script handle; ignored on admin screens.
    pub fn enqueue_asset(&self, handle: &str) {
        if !self.context.admin_screen {
            self.state.enqueue_asset(handle);
        }
    }
}

impl ShortcodeExpander for RenderScope<'_> {
    fn expand(&self, text: &str) -> String {
        self.expand_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_guard_releases_on_drop() {
        let state = RenderState::new(2);
        {
            let _outer = state.enter().expect("first level");
            let _inner = state.enter().expect("second level");
            assert!(state.enter().is_none());
            assert_eq!(state.depth(), 2);
        }
        assert_eq!(state.depth(), 0);
        assert!(state.enter().is_some());
    }

    #[test]
    fn template_stack_rejects_reentry() {
        let state = RenderState::new(4);
        let guard = state.enter_template(7).expect("first entry");
        assert!(state.enter_template(7).is_none());
        assert!(state.enter_template(8).is_some());
        drop(guard);
        assert!(state.enter_template(7).is_some());
    }

    #[test]
    fn assets_are_deduplicated_and_sorted() {
        let state = RenderState::new(1);
        state.enqueue_asset("weft-qr-code");
        state.enqueue_asset("weft-spoiler");
        state.enqueue_asset("weft-qr-code");
        assert_eq!(state.assets(), vec!["weft-qr-code", "weft-spoiler"]);
    }
}
