//! Built-in directive handlers.
//!
//! Every handler receives the already-resolved, trimmed parameter and fails
//! soft to an empty string. Entity handlers accept `name@id` to read a
//! specific record instead of the current one.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::DirectiveResolver;
use crate::application::repos::RepoError;
use crate::application::scope::RenderScope;
use crate::util::html::strip_tags;

/// Cache group for option and constant lookups.
pub const DYNAMIC_GROUP: &str = "dynamic";

pub(crate) fn register_builtins(resolver: &mut DirectiveResolver) {
    resolver.register(&["get", "ge"], Arc::new(query_value));
    resolver.register(&["post", "po"], Arc::new(body_value));
    resolver.register(&["request", "rq"], Arc::new(request_value));
    resolver.register(&["server", "sv"], Arc::new(server_value));
    resolver.register(&["cookie", "ck"], Arc::new(cookie_value));
    resolver.register(&["session", "ss"], Arc::new(session_value));
    resolver.register(&["option", "op"], Arc::new(option_value));
    resolver.register(&["const", "co"], Arc::new(constant_value));
    resolver.register(&["post_field", "pf"], Arc::new(post_field));
    resolver.register(&["post_meta", "pm"], Arc::new(post_meta));
    resolver.register(&["term_field", "tf"], Arc::new(term_field));
    resolver.register(&["term_meta", "tm"], Arc::new(term_meta));
    resolver.register(&["user_field", "uf"], Arc::new(user_field));
    resolver.register(&["user_meta", "um"], Arc::new(user_meta));
    resolver.register(&["func", "fn"], Arc::new(call_function));
    resolver.register(&["shortcode", "sc"], Arc::new(render_shortcode));
    resolver.register_url(&["url", "ur"], Arc::new(site_url));
}

fn owned(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_default()
}

fn query_value(param: &str, scope: &RenderScope<'_>) -> String {
    owned(scope.context().query.get(param).map(String::as_str))
}

fn body_value(param: &str, scope: &RenderScope<'_>) -> String {
    owned(scope.context().body.get(param).map(String::as_str))
}

fn request_value(param: &str, scope: &RenderScope<'_>) -> String {
    owned(scope.context().request_value(param))
}

fn server_value(param: &str, scope: &RenderScope<'_>) -> String {
    let server = &scope.context().server;
    owned(
        server
            .get(param)
            .or_else(|| server.get(&param.to_ascii_uppercase()))
            .map(String::as_str),
    )
}

fn cookie_value(param: &str, scope: &RenderScope<'_>) -> String {
    owned(scope.context().cookies.get(param).map(String::as_str))
}

fn session_value(param: &str, scope: &RenderScope<'_>) -> String {
    owned(scope.context().session_value(param))
}

fn string_only(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

/// Option/constant lookups go through the cache unless the TTL is zero.
fn cached_lookup<F>(scope: &RenderScope<'_>, kind: &str, name: &str, fetch: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    let engine = scope.engine();
    let ttl = engine.limits().lookup_cache_ttl;
    if ttl == 0 {
        return fetch();
    }
    let cache = engine.cache();
    let key = cache.build_key(&json!({ "kind": kind, "param": name }), DYNAMIC_GROUP);
    cache.remember(&key, ttl, DYNAMIC_GROUP, fetch)
}

fn option_value(param: &str, scope: &RenderScope<'_>) -> String {
    if param.is_empty() {
        return String::new();
    }
    let options = Arc::clone(&scope.engine().collaborators().options);
    cached_lookup(scope, "option", param, || {
        string_only(loaded(options.option(param), "option"))
    })
    .unwrap_or_default()
}

fn constant_value(param: &str, scope: &RenderScope<'_>) -> String {
    if param.is_empty() {
        return String::new();
    }
    let constants = Arc::clone(&scope.engine().collaborators().constants);
    cached_lookup(scope, "const", param, || string_only(constants.constant(param)))
        .unwrap_or_default()
}

/// Split `name@id`; the id part must be numeric to count.
pub(crate) fn split_target(param: &str) -> (&str, Option<u64>) {
    match param.rsplit_once('@') {
        Some((name, id)) => match id.trim().parse::<u64>() {
            Ok(id) => (name.trim(), Some(id)),
            Err(_) => (param, None),
        },
        None => (param, None),
    }
}

/// Log repository failures and treat them as "not found".
pub(crate) fn loaded<T>(result: Result<Option<T>, RepoError>, what: &'static str) -> Option<T> {
    match result {
        Ok(found) => found,
        Err(err) => {
            warn!(
                op = "lookup",
                target_module = "weft::application::resolver",
                what,
                error = %err,
                "Collaborator lookup failed"
            );
            None
        }
    }
}

fn post_field(param: &str, scope: &RenderScope<'_>) -> String {
    let (name, id) = split_target(param);
    id.or(scope.context().current_post)
        .and_then(|id| loaded(scope.engine().collaborators().content.post(id), "post"))
        .and_then(|post| post.field(name))
        .unwrap_or_default()
}

fn post_meta(param: &str, scope: &RenderScope<'_>) -> String {
    let (key, id) = split_target(param);
    id.or(scope.context().current_post)
        .and_then(|id| loaded(scope.engine().collaborators().content.post(id), "post"))
        .and_then(|post| post.meta_text(key))
        .unwrap_or_default()
}

fn term_field(param: &str, scope: &RenderScope<'_>) -> String {
    let (name, id) = split_target(param);
    id.or(scope.context().queried_term)
        .and_then(|id| loaded(scope.engine().collaborators().content.term(id), "term"))
        .and_then(|term| term.field(name))
        .unwrap_or_default()
}

fn term_meta(param: &str, scope: &RenderScope<'_>) -> String {
    let (key, id) = split_target(param);
    id.or(scope.context().queried_term)
        .and_then(|id| loaded(scope.engine().collaborators().content.term(id), "term"))
        .and_then(|term| term.meta_text(key))
        .unwrap_or_default()
}

fn user_field(param: &str, scope: &RenderScope<'_>) -> String {
    let (name, id) = split_target(param);
    id.or(scope.context().viewer.user_id)
        .and_then(|id| loaded(scope.engine().collaborators().content.user(id), "user"))
        .and_then(|user| user.field(name))
        .unwrap_or_default()
}

fn user_meta(param: &str, scope: &RenderScope<'_>) -> String {
    let (key, id) = split_target(param);
    id.or(scope.context().viewer.user_id)
        .and_then(|id| loaded(scope.engine().collaborators().content.user(id), "user"))
        .and_then(|user| user.meta_text(key))
        .unwrap_or_default()
}

fn site_url(param: &str, scope: &RenderScope<'_>) -> String {
    scope
        .engine()
        .urls()
        .resolve(param, scope.context())
        .unwrap_or_default()
}

/// `name, arg, arg`: allowlist first, then existence, then the call.
pub(crate) fn call_function(param: &str, scope: &RenderScope<'_>) -> String {
    let mut parts = param.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return String::new();
    }
    let args: Vec<String> = parts.map(str::to_string).collect();

    let engine = scope.engine();
    let privileged = scope.context().is_privileged();

    if !engine.allowlist().allows(name) {
        debug!(op = "func", function = name, "Function call rejected by allowlist");
        return if privileged {
            format!("Function \"{name}\" is not allowlisted.")
        } else {
            String::new()
        };
    }

    match engine.functions().call(name, &args) {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            warn!(
                op = "func",
                target_module = "weft::application::resolver",
                function = name,
                error = %err,
                "Host function failed"
            );
            String::new()
        }
        None if privileged => format!("Function \"{name}\" does not exist."),
        None => String::new(),
    }
}

/// `weft type=...` or `(weft type=...)`, dispatched and tag-stripped.
pub(crate) fn render_shortcode(param: &str, scope: &RenderScope<'_>) -> String {
    let inner = param.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(inner)
        .trim();
    if inner.is_empty() {
        return String::new();
    }
    strip_tags(&scope.expand_shortcodes(&format!("[{inner}]")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_target_needs_numeric_id() {
        assert_eq!(split_target("title@42"), ("title", Some(42)));
        assert_eq!(split_target("title"), ("title", None));
        assert_eq!(split_target("user@example.com"), ("user@example.com", None));
    }
}
