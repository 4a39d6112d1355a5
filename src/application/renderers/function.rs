//! `function` renderer: `name="fn, arg | arg"`.

use serde_json::Value;
use tracing::{debug, warn};

use super::{base_defaults, finish_value};
use crate::application::dispatch::Renderer;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::util::html::{clean_url, escape_html};

pub struct FunctionRenderer;

impl FunctionRenderer {
    fn diagnostic(scope: &RenderScope<'_>, message: String) -> String {
        if scope.context().is_privileged() {
            message
        } else {
            String::new()
        }
    }
}

impl Renderer for FunctionRenderer {
    fn type_tag(&self) -> &str {
        "function"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("name", "");
        defaults
    }

    fn render(&self, attributes: &AttributeMap, _content: &str, scope: &RenderScope<'_>) -> String {
        let call = attributes.text("name");
        let (name, raw_args) = match call.split_once(',') {
            Some((name, args)) => (name.trim(), args.trim()),
            None => (call.trim(), ""),
        };
        if name.is_empty() {
            return String::new();
        }

        let engine = scope.engine();
        if !engine.functions().contains(name) {
            debug!(op = "function", function = name, "Unknown function requested");
            return Self::diagnostic(
                scope,
                format!("Function \"{}\" does not exist.", escape_html(name)),
            );
        }

        if !engine.allowlist().allows(name) {
            debug!(op = "function", function = name, "Function call rejected by allowlist");
            return Self::diagnostic(
                scope,
                format!(
                    "Function \"{}\" is not allowlisted. Please <a href=\"{}\">add it to the allowlist</a>.",
                    escape_html(name),
                    clean_url(&engine.urls().settings()),
                ),
            );
        }

        let args: Vec<String> = if raw_args.is_empty() {
            Vec::new()
        } else {
            raw_args
                .split('|')
                .map(|token| scope.resolve_text(token.trim()))
                .filter(|arg| !arg.is_empty())
                .collect()
        };

        let value = match engine.functions().call(name, &args) {
            Some(Ok(value)) => Value::String(value),
            Some(Err(err)) => {
                warn!(
                    op = "function",
                    target_module = "weft::application::renderers::function",
                    function = name,
                    error = %err,
                    "Host function failed"
                );
                Value::Null
            }
            None => Value::Null,
        };

        finish_value(&value, attributes, scope)
    }
}
