use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use weft::application::engine::{Engine, EngineLimits};
use weft::application::repos::Collaborators;
use weft::application::scope::RenderScope;
use weft::cache::{Cache, CacheConfig};
use weft::domain::attributes::AttributeMap;
use weft::domain::context::RequestContext;
use weft::infra::fixture::SiteFixture;

const SITE: &str = r#"
base_url = "https://example.com"

[options]
blogname = "Metrics Site"

[[posts]]
id = 1
title = "Counted"
slug = "counted"
"#;

// One test per binary: the recorder is process-global.
#[test]
fn cache_and_render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = Arc::new(Cache::from_config(&CacheConfig::default()).expect("memory cache"));
    assert_eq!(cache.get::<String>("absent", "query"), None);
    assert!(cache.set("present", "value", 0, "query"));
    assert_eq!(
        cache.get::<String>("present", "query").as_deref(),
        Some("value")
    );
    assert_eq!(cache.get::<u64>("present", "query"), None);

    let site = Arc::new(SiteFixture::from_toml_str(SITE).expect("fixture parses"));
    let engine = Engine::builder(Collaborators::from_site(site), Arc::clone(&cache))
        .limits(EngineLimits {
            max_passes: 2,
            max_depth: 3,
            ..EngineLimits::default()
        })
        .register_handler(
            &["grow"],
            Arc::new(|_: &str, _: &RenderScope<'_>| "+{grow:x}".to_string()),
        )
        .register_handler(
            &["dive"],
            Arc::new(|_: &str, scope: &RenderScope<'_>| scope.resolve_text("{dive:x}")),
        )
        .build();
    let context = RequestContext {
        current_post: Some(1),
        ..RequestContext::default()
    };

    assert_eq!(engine.resolve(&context, "{grow:x}"), "++{grow:x}");
    assert_eq!(engine.resolve(&context, "[{dive:x}]"), "[]");
    assert_eq!(
        engine.render(&context, "post-field", AttributeMap::from_iter([("name", "title")]), ""),
        "Counted"
    );
    assert_eq!(
        engine.render(&context, "no-such-type", AttributeMap::new(), ""),
        ""
    );

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "weft_cache_hit_total",
        "weft_cache_miss_total",
        "weft_cache_write_total",
        "weft_cache_error_total",
        "weft_resolver_pass_limit_total",
        "weft_resolver_depth_limit_total",
        "weft_render_total",
        "weft_render_unknown_type_total",
    ] {
        assert!(names.contains(expected), "missing metric {expected}: {names:?}");
    }
}
