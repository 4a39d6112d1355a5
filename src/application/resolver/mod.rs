//! `{alias:param}` directive resolution.
//!
//! A directive is replaced by its handler's output. The parameter is resolved
//! first, so directives nest (`{fn:strtoupper, {get:name}}`). Handler output
//! may itself contain directives; whole-text passes repeat until the output
//! stops changing or the pass limit is reached. Unknown aliases are left in
//! place verbatim.

pub mod handlers;
pub(crate) mod scan;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::scope::RenderScope;
use crate::util::html::clean_url;
use crate::util::text::sanitize_text_field;

const METRIC_PASS_LIMIT: &str = "weft_resolver_pass_limit_total";
const METRIC_DEPTH_LIMIT: &str = "weft_resolver_depth_limit_total";

/// Resolution cache keyed by literal directive text. Lives for one
/// top-level resolve call.
pub type Memo = HashMap<String, String>;

/// Maps a resolved, trimmed parameter to replacement text.
pub type Handler = Arc<dyn Fn(&str, &RenderScope<'_>) -> String + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleaner {
    Text,
    Url,
}

#[derive(Clone)]
struct Entry {
    handler: Handler,
    cleaner: Cleaner,
}

#[derive(Clone, Default)]
pub struct DirectiveResolver {
    handlers: BTreeMap<String, Entry>,
}

impl DirectiveResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with every built-in alias bound.
    pub fn with_builtins() -> Self {
        let mut resolver = Self::new();
        handlers::register_builtins(&mut resolver);
        resolver
    }

    /// Bind `handler` to every alias (case-insensitive). Output is cleaned
    /// to plain text.
    pub fn register(&mut self, aliases: &[&str], handler: Handler) {
        self.bind(aliases, handler, Cleaner::Text);
    }

    pub(crate) fn register_url(&mut self, aliases: &[&str], handler: Handler) {
        self.bind(aliases, handler, Cleaner::Url);
    }

    fn bind(&mut self, aliases: &[&str], handler: Handler, cleaner: Cleaner) {
        for alias in aliases {
            self.handlers.insert(
                alias.trim().to_ascii_lowercase(),
                Entry {
                    handler: Arc::clone(&handler),
                    cleaner,
                },
            );
        }
    }

    pub fn knows(&self, alias: &str) -> bool {
        self.handlers.contains_key(&alias.to_ascii_lowercase())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Invoke the handler for `alias` directly; `None` for unknown aliases.
    pub fn call(&self, alias: &str, param: &str, scope: &RenderScope<'_>) -> Option<String> {
        let entry = self.handlers.get(&alias.to_ascii_lowercase())?;
        let raw = (entry.handler)(param.trim(), scope);
        Some(match entry.cleaner {
            Cleaner::Text => sanitize_text_field(&raw),
            Cleaner::Url => clean_url(&raw),
        })
    }

    /// Resolve every directive in `text`, repeating passes while the output
    /// changes, up to the configured limit.
    pub fn resolve(&self, text: &str, scope: &RenderScope<'_>, memo: &mut Memo) -> String {
        let max_passes = scope.engine().limits().max_passes.max(1);
        let mut current = text.to_string();

        for pass in 1..=max_passes {
            let next = self.substitute(&current, scope, memo);
            if next == current {
                return next;
            }
            debug!(op = "resolve", pass, "Directive pass changed output");
            current = next;
        }

        if scan::next_directive(&current, 0).is_some_and(|d| self.knows(d.alias)) {
            counter!(METRIC_PASS_LIMIT).increment(1);
            warn!(
                op = "resolve",
                target_module = "weft::application::resolver",
                max_passes,
                "Directive pass limit reached; returning partial output"
            );
        }
        current
    }

    /// One pass over `text`.
    fn substitute(&self, text: &str, scope: &RenderScope<'_>, memo: &mut Memo) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        while let Some(directive) = scan::next_directive(text, cursor) {
            out.push_str(&text[cursor..directive.start]);
            let literal = directive.text(text);

            if !self.knows(directive.alias) {
                out.push_str(literal);
            } else if let Some(hit) = memo.get(literal) {
                out.push_str(hit);
            } else {
                let value = self.evaluate(directive.alias, directive.param, scope, memo);
                memo.insert(literal.to_string(), value.clone());
                out.push_str(&value);
            }
            cursor = directive.end;
        }

        out.push_str(&text[cursor..]);
        out
    }

    fn evaluate(&self, alias: &str, param: &str, scope: &RenderScope<'_>, memo: &mut Memo) -> String {
        let Some(_guard) = scope.state().enter() else {
            counter!(METRIC_DEPTH_LIMIT).increment(1);
            warn!(
                op = "resolve",
                target_module = "weft::application::resolver",
                alias,
                "Directive nesting limit reached"
            );
            return String::new();
        };

        let param = self.substitute(param, scope, memo);
        self.call(alias, &param, scope).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
