use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::application::engine::EngineLimits;
use crate::application::functions::host;
use crate::application::test_support::{builder, engine, manager, visitor};
use crate::domain::context::RequestContext;

fn with_query(pairs: &[(&str, &str)]) -> RequestContext {
    let mut context = visitor();
    for (key, value) in pairs {
        context.query.insert(key.to_string(), value.to_string());
    }
    context
}

#[test]
fn request_sources_are_read_and_sanitized() {
    let engine = engine();
    let mut context = with_query(&[("name", "<script>alert(1)</script>Ada  Lovelace")]);
    context.body.insert("name".into(), "Grace".into());
    context
        .server
        .insert("HTTP_HOST".into(), "example.com".into());
    context.cookies.insert("theme".into(), "dark".into());

    assert_eq!(engine.resolve(&context, "Hi {get:name}!"), "Hi Ada Lovelace!");
    assert_eq!(engine.resolve(&context, "{post:name}"), "Grace");
    assert_eq!(engine.resolve(&context, "{rq:name}"), "Grace");
    assert_eq!(engine.resolve(&context, "{sv:http_host}"), "example.com");
    assert_eq!(engine.resolve(&context, "{ck:theme}"), "dark");
    assert_eq!(engine.resolve(&context, "[{ss:cart}]"), "[]");
    assert_eq!(engine.resolve(&context, "[{ge:missing}]"), "[]");
}

#[test]
fn aliases_are_case_insensitive() {
    let engine = engine();
    let context = with_query(&[("name", "Ada")]);
    assert_eq!(engine.resolve(&context, "{GET:name}"), "Ada");
}

#[test]
fn unknown_aliases_and_plain_braces_stay_verbatim() {
    let engine = engine();
    let context = visitor();
    let text = "{nope:value} {x:short} {not a directive} {}";
    assert_eq!(engine.resolve(&context, text), text);
}

#[test]
fn nested_directives_resolve_inside_out() {
    let engine = engine();
    let context = with_query(&[("name", "ada"), ("key", "title")]);

    assert_eq!(engine.resolve(&context, "{fn:strtoupper, {get:name}}"), "ADA");
    assert_eq!(engine.resolve(&context, "{pf:{get:key}}"), "Hello World");
}

#[test]
fn handler_output_is_resolved_again() {
    let engine = engine();
    let context = with_query(&[("name", "Ada")]);
    // Post 7 stores `{get:name}` as its subtitle.
    assert_eq!(engine.resolve(&context, "{pm:subtitle}"), "Ada");
}

#[test]
fn pass_limit_bounds_self_growing_output() {
    let engine = builder()
        .limits(EngineLimits {
            max_passes: 3,
            ..EngineLimits::default()
        })
        .register_handler(
            &["grow"],
            Arc::new(|_: &str, _: &RenderScope<'_>| "a{grow:x}".to_string()),
        )
        .build();

    assert_eq!(engine.resolve(&visitor(), "{grow:x}"), "aaa{grow:x}");
}

#[test]
fn depth_limit_stops_recursive_handlers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let engine = builder()
        .limits(EngineLimits {
            max_depth: 4,
            ..EngineLimits::default()
        })
        .register_handler(
            &["deep"],
            Arc::new(move |_: &str, scope: &RenderScope<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                format!("<{}>", scope.resolve_text("{deep:again}"))
            }),
        )
        .build();

    let output = engine.resolve(&visitor(), "{deep:start}");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // Angle brackets are treated as markup by the text cleaner.
    assert!(!output.contains("{deep"));
}

#[test]
fn identical_directives_are_evaluated_once_per_resolve() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let engine = builder()
        .register_handler(
            &["tick"],
            Arc::new(move |_: &str, _: &RenderScope<'_>| {
                counter.fetch_add(1, Ordering::SeqCst).to_string()
            }),
        )
        .build();

    assert_eq!(engine.resolve(&visitor(), "{tick:a} {tick:a} {tick:b}"), "0 0 1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // A new top-level call starts with an empty memo.
    assert_eq!(engine.resolve(&visitor(), "{tick:a}"), "2");
}

#[test]
fn options_and_constants_expose_strings_only() {
    let engine = engine();
    let context = visitor();

    assert_eq!(engine.resolve(&context, "{option:blogname}"), "Example Site");
    assert_eq!(engine.resolve(&context, "{op:tagline}"), "Bold claims");
    assert_eq!(engine.resolve(&context, "[{op:structured}]"), "[]");
    assert_eq!(engine.resolve(&context, "{co:WEFT_MODE}"), "production");
    assert_eq!(engine.resolve(&context, "[{const:MAX_ITEMS}]"), "[]");
    assert_eq!(engine.resolve(&context, "[{const:UNDEFINED}]"), "[]");
}

#[test]
fn option_lookups_are_cached_in_the_dynamic_group() {
    let engine = engine();
    let context = visitor();
    engine.resolve(&context, "{option:blogname}");

    let key = engine.cache().build_key(
        &serde_json::json!({ "kind": "option", "param": "blogname" }),
        handlers::DYNAMIC_GROUP,
    );
    assert_eq!(
        engine
            .cache()
            .get::<Option<String>>(&key, handlers::DYNAMIC_GROUP),
        Some(Some("Example Site".to_string()))
    );
}

#[test]
fn entity_handlers_follow_context_or_explicit_id() {
    let engine = engine();
    let visitor = visitor();
    let manager = manager();

    assert_eq!(engine.resolve(&visitor, "{pf:title}"), "Hello World");
    assert_eq!(engine.resolve(&visitor, "{post_field:post_title@8}"), "Second Story");
    assert_eq!(engine.resolve(&visitor, "[{pf:title@99}]"), "[]");
    assert_eq!(engine.resolve(&visitor, "{pm:price}"), "1234.5");
    assert_eq!(engine.resolve(&visitor, "[{pm:tags}]"), "[]");
    assert_eq!(engine.resolve(&visitor, "{tf:name} {tm:color}"), "News blue");
    assert_eq!(engine.resolve(&visitor, "[{uf:display_name}]"), "[]");
    assert_eq!(engine.resolve(&manager, "{uf:display_name}"), "Ada Lovelace");
    assert_eq!(engine.resolve(&visitor, "{um:nickname@5}"), "countess");
}

#[test]
fn url_kinds_resolve_and_unknown_kinds_are_empty() {
    let engine = builder()
        .register_url_kind(
            "docs",
            Arc::new(|_: &RequestContext| Some("https://docs.example.com/".to_string())),
        )
        .build();
    let context = visitor();

    assert_eq!(engine.resolve(&context, "{url:home}"), "http://localhost/");
    assert_eq!(engine.resolve(&context, "{ur:docs}"), "https://docs.example.com/");
    assert_eq!(engine.resolve(&context, "[{url:nowhere}]"), "[]");
}

#[test]
fn functions_respect_the_allowlist() {
    let engine = engine();

    assert_eq!(engine.resolve(&visitor(), "{fn:word_count, one two three}"), "3");
    assert_eq!(engine.resolve(&visitor(), "[{fn:str_repeat, ab, 2}]"), "[]");
    assert_eq!(
        engine.resolve(&manager(), "{fn:str_repeat, ab, 2}"),
        "Function \"str_repeat\" is not allowlisted."
    );

    let opened = builder().allow_functions(["str_repeat"]).build();
    assert_eq!(opened.resolve(&visitor(), "{fn:str_repeat, ab, 2}"), "abab");
}

#[test]
fn rejected_functions_are_never_invoked() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tally = |calls: &Arc<AtomicUsize>| {
        let counter = Arc::clone(calls);
        host(move |_: &[String]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("counted".to_string())
        })
    };
    let engine = builder().register_function("tally", tally(&calls)).build();

    for context in [visitor(), manager()] {
        engine.resolve(&context, "{fn:tally, x}");
        engine.render(
            &context,
            "post-field",
            [("name", "title"), ("before", "fn:tally, x")].into_iter().collect(),
            "",
        );
        engine.render(
            &context,
            "function",
            [("name", "tally, x")].into_iter().collect(),
            "",
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let allowed = Arc::new(AtomicUsize::new(0));
    let opened = builder()
        .register_function("tally", tally(&allowed))
        .allow_functions(["tally"])
        .build();
    assert_eq!(opened.resolve(&visitor(), "{fn:tally, x}"), "counted");
    assert_eq!(allowed.load(Ordering::SeqCst), 1);
}

#[test]
fn resolving_resolved_text_changes_nothing() {
    let engine = engine();
    let context = with_query(&[("name", "ada"), ("echo", "{option:blogname}")]);
    let source = "Hi {get:name} on {option:blogname} / {get:echo} {nope:keep} {fn:strtoupper, {get:name}}";

    let once = engine.resolve(&context, source);
    assert_eq!(once, "Hi ada on Example Site / Example Site {nope:keep} ADA");
    assert_eq!(engine.resolve(&context, &once), once);
}

#[test]
fn shortcode_directive_dispatches_and_strips_markup() {
    let engine = engine();
    let context = visitor();

    assert_eq!(
        engine.resolve(&context, r#"{sc:weft type="post-field" name="title" before="<em>" after="</em>"}"#),
        "Hello World"
    );
    assert_eq!(
        engine.resolve(&context, r#"{sc:(weft type="term-field" name="name")}"#),
        "News"
    );
    assert_eq!(engine.resolve(&context, "[{sc:}]"), "[]");
}

#[test]
fn resolver_can_be_queried_directly() {
    let resolver = DirectiveResolver::with_builtins();
    assert!(resolver.knows("PF"));
    assert!(!resolver.knows("nope"));
    assert!(resolver.aliases().any(|alias| alias == "shortcode"));
}
