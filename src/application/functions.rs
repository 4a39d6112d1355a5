//! Host functions callable from `{func:...}` directives and `function`
//! renderers.
//!
//! Only names that are both registered here and present in the
//! [`Allowlist`](super::allowlist::Allowlist) are ever invoked.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Datelike, Utc};

use crate::domain::error::FunctionError;
use crate::util::text::{intval, ucfirst, ucwords};

pub type HostFunction = Arc<dyn Fn(&[String]) -> Result<String, FunctionError> + Send + Sync>;

const MAX_REPEAT_OUTPUT: usize = 4096;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, HostFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in text and number helpers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("date", host(date));
        registry.register("current_year", host(|_| Ok(Utc::now().year().to_string())));
        registry.register("strtoupper", host(|args| Ok(first(args).to_uppercase())));
        registry.register("strtolower", host(|args| Ok(first(args).to_lowercase())));
        registry.register("ucfirst", host(|args| Ok(ucfirst(first(args)))));
        registry.register("ucwords", host(|args| Ok(ucwords(first(args)))));
        registry.register("trim", host(|args| Ok(first(args).trim().to_string())));
        registry.register(
            "strlen",
            host(|args| Ok(first(args).chars().count().to_string())),
        );
        registry.register(
            "word_count",
            host(|args| Ok(first(args).split_whitespace().count().to_string())),
        );
        registry.register("implode", host(implode));
        registry.register("number_format", host(number_format_fn));
        registry.register("max", host(|args| extreme("max", args, i64::max)));
        registry.register("min", host(|args| extreme("min", args, i64::min)));
        registry.register(
            "abs",
            host(|args| Ok(intval(first(args)).saturating_abs().to_string())),
        );
        registry.register("str_repeat", host(str_repeat));
        registry
    }

    /// Bind `name` (case-insensitive), replacing any earlier binding.
    pub fn register(&mut self, name: &str, function: HostFunction) {
        self.functions
            .insert(name.trim().to_ascii_lowercase(), function);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .contains_key(&name.trim().to_ascii_lowercase())
    }

    /// `None` when no function is registered under `name`.
    pub fn call(&self, name: &str, args: &[String]) -> Option<Result<String, FunctionError>> {
        self.functions
            .get(&name.trim().to_ascii_lowercase())
            .map(|function| function(args))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

/// Wrap a closure as a [`HostFunction`].
pub fn host<F>(function: F) -> HostFunction
where
    F: Fn(&[String]) -> Result<String, FunctionError> + Send + Sync + 'static,
{
    Arc::new(function)
}

fn first(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or("")
}

fn date(args: &[String]) -> Result<String, FunctionError> {
    let pattern = match first(args).trim() {
        "" => "%Y-%m-%d",
        custom => custom,
    };
    let mut rendered = String::new();
    write!(rendered, "{}", Utc::now().format(pattern))
        .map_err(|_| FunctionError::argument("date", format!("invalid format `{pattern}`")))?;
    Ok(rendered)
}

fn implode(args: &[String]) -> Result<String, FunctionError> {
    match args.split_first() {
        Some((separator, rest)) => Ok(rest.join(separator)),
        None => Err(FunctionError::arity("implode", "a separator and values")),
    }
}

fn number_format_fn(args: &[String]) -> Result<String, FunctionError> {
    let number: f64 = first(args)
        .trim()
        .parse()
        .map_err(|_| FunctionError::argument("number_format", "expected a number"))?;
    let decimals = args.get(1).map(|raw| intval(raw).clamp(0, 10)).unwrap_or(0);
    Ok(super::format::number_format(number, decimals as usize))
}

fn extreme(
    name: &'static str,
    args: &[String],
    pick: fn(i64, i64) -> i64,
) -> Result<String, FunctionError> {
    args.iter()
        .map(|raw| intval(raw))
        .reduce(pick)
        .map(|value| value.to_string())
        .ok_or_else(|| FunctionError::arity(name, "at least one value"))
}

fn str_repeat(args: &[String]) -> Result<String, FunctionError> {
    let text = first(args);
    let times = args.get(1).map(|raw| intval(raw)).unwrap_or(0).max(0) as usize;
    if text.len().saturating_mul(times) > MAX_REPEAT_OUTPUT {
        return Err(FunctionError::argument(
            "str_repeat",
            format!("output would exceed {MAX_REPEAT_OUTPUT} bytes"),
        ));
    }
    Ok(text.repeat(times))
}
