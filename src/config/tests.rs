use clap::Parser;

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.cache.backend, BackendKind::Memory);
    assert_eq!(settings.cache.default_ttl_seconds, 86_400);
    assert_eq!(settings.cache.query_ttl_seconds, 43_200);
    assert_eq!(settings.resolver.max_passes, 10);
    assert_eq!(settings.resolver.max_depth, 10);
    assert_eq!(settings.resolver.lookup_cache_ttl_seconds, 300);
    assert_eq!(settings.site.home_url.as_str(), "http://localhost/");
    assert_eq!(settings.site.admin_url.as_str(), "http://localhost/admin/");
    assert_eq!(settings.site.timezone, chrono_tz::UTC);
    assert_eq!(settings.site.shortcode_tag, "weft");
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.resolver.max_depth = Some(4);
    raw.functions.allowlist = vec!["site_name".to_string()];

    let overrides = GlobalOverrides {
        log_level: Some("debug".to_string()),
        resolver_max_depth: Some(2),
        allow_functions: vec!["word_count".to_string()],
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.resolver.max_depth, 2);
    assert_eq!(
        settings.functions.allowlist,
        vec!["site_name".to_string(), "word_count".to_string()]
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn unknown_cache_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("redis".to_string());

    let err = Settings::from_raw(raw).expect_err("backend must be rejected");
    assert!(matches!(err, LoadError::Invalid { key: "cache.backend", .. }));
}

#[test]
fn cache_prefix_needs_key_characters() {
    let mut raw = RawSettings::default();
    raw.cache.prefix = Some("..".to_string());

    let err = Settings::from_raw(raw).expect_err("empty prefix must be rejected");
    assert!(matches!(err, LoadError::Invalid { key: "cache.prefix", .. }));
}

#[test]
fn file_backend_is_selected_case_insensitively() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some(" File ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, BackendKind::File);
}

#[test]
fn zero_limits_are_rejected() {
    let mut raw = RawSettings::default();
    raw.resolver.max_passes = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero passes must be rejected");
    assert!(matches!(err, LoadError::Invalid { key: "resolver.max_passes", .. }));

    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl must be rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.default_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn site_urls_gain_trailing_slash_and_admin_follows_site() {
    let mut raw = RawSettings::default();
    raw.site.home_url = Some("https://example.com".to_string());
    raw.site.site_url = Some("https://example.com/wp".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.home_url.as_str(), "https://example.com/");
    assert_eq!(settings.site.site_url.as_str(), "https://example.com/wp/");
    assert_eq!(settings.site.admin_url.as_str(), "https://example.com/wp/admin/");
}

#[test]
fn non_http_site_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.site.home_url = Some("ftp://example.com".to_string());
    let err = Settings::from_raw(raw).expect_err("scheme must be rejected");
    assert!(matches!(err, LoadError::Invalid { key: "site.home_url", .. }));
}

#[test]
fn timezone_and_tag_are_validated() {
    let mut raw = RawSettings::default();
    raw.site.timezone = Some("Europe/Berlin".to_string());
    raw.site.shortcode_tag = Some("AnyS".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.timezone, chrono_tz::Europe::Berlin);
    assert_eq!(settings.site.shortcode_tag, "anys");

    let mut raw = RawSettings::default();
    raw.site.timezone = Some("Mars/Olympus".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.site.shortcode_tag = Some("bad tag".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "weft",
        "render",
        "--site",
        "/tmp/site.toml",
        "--text",
        "{get:name}",
        "--query",
        "name=Ada",
        "--post",
        "7",
        "--manage",
    ]);

    match args.command {
        Command::Render(render) => {
            assert_eq!(render.request.site, std::path::Path::new("/tmp/site.toml"));
            assert_eq!(render.text.as_deref(), Some("{get:name}"));
            assert_eq!(render.request.query, vec!["name=Ada".to_string()]);
            assert_eq!(render.request.post, Some(7));
            assert!(render.request.manage);
            assert!(!render.request.admin_screen);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_dispatch_arguments() {
    let args = CliArgs::parse_from([
        "weft",
        "dispatch",
        "--site",
        "/tmp/site.toml",
        "--type",
        "link",
        "--attr",
        "name=home",
        "--attr",
        "format=anchor",
        "--log-level",
        "warn",
    ]);

    assert_eq!(args.overrides.log_level.as_deref(), Some("warn"));
    match args.command {
        Command::Dispatch(dispatch) => {
            assert_eq!(dispatch.type_tag, "link");
            assert_eq!(
                parse_pairs(&dispatch.attributes),
                vec![
                    ("name".to_string(), "home".to_string()),
                    ("format".to_string(), "anchor".to_string()),
                ]
            );
            assert_eq!(dispatch.content, "");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_cache_commands() {
    let args = CliArgs::parse_from(["weft", "cache", "flush", "--group", "query"]);
    match args.command {
        Command::Cache(cache) => match cache.command {
            CacheCommand::Flush(flush) => assert_eq!(flush.group.as_deref(), Some("query")),
            CacheCommand::Key(_) => panic!("wrong cache command parsed"),
        },
        _ => panic!("wrong command parsed"),
    }

    let args = CliArgs::parse_from(["weft", "cache", "key", "--group", "query", "[1,2]"]);
    match args.command {
        Command::Cache(cache) => match cache.command {
            CacheCommand::Key(key) => {
                assert_eq!(key.group, "query");
                assert_eq!(key.payload, "[1,2]");
            }
            CacheCommand::Flush(_) => panic!("wrong cache command parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn allow_function_splits_on_commas() {
    let args = CliArgs::parse_from([
        "weft",
        "cache",
        "flush",
        "--allow-function",
        "site_name,word_count",
    ]);
    assert_eq!(
        args.overrides.allow_functions,
        vec!["site_name".to_string(), "word_count".to_string()]
    );
}

#[test]
fn pairs_without_value_map_to_empty() {
    assert_eq!(
        parse_pairs(&["flag".to_string(), "=skip".to_string(), "a=b=c".to_string()]),
        vec![
            ("flag".to_string(), String::new()),
            ("a".to_string(), "b=c".to_string()),
        ]
    );
}
