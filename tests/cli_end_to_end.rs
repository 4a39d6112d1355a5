use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::NamedTempFile;

const SITE: &str = r#"
base_url = "https://example.com"

[options]
blogname = "CLI Site"

[[posts]]
id = 1
title = "Hello"
slug = "hello"
"#;

fn site_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(SITE.as_bytes()).expect("write fixture");
    file
}

fn weft() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("weft"));
    cmd.env_remove("WEFT_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .env("WEFT__LOGGING__LEVEL", "error");
    cmd
}

#[test]
fn render_expands_directives_and_shortcodes() {
    let site = site_file();
    weft()
        .arg("render")
        .arg("--site")
        .arg(site.path())
        .arg("--post")
        .arg("1")
        .arg("--query")
        .arg("who=Ada")
        .arg("--text")
        .arg(r#"{option:blogname} / {get:who} / [weft type="post-field" name="title"/]"#)
        .assert()
        .success()
        .stdout("CLI Site / Ada / Hello\n");
}

#[test]
fn render_reads_stdin_and_lists_assets() {
    let site = site_file();
    weft()
        .arg("render")
        .arg("--site")
        .arg(site.path())
        .arg("--show-assets")
        .write_stdin(r#"[weft type="spoiler"]hidden[/weft]"#)
        .assert()
        .success()
        .stdout(contains("<spoiler-span>hidden</spoiler-span>"))
        .stdout(contains("asset: weft-spoiler"));
}

#[test]
fn dispatch_renders_one_type() {
    let site = site_file();
    weft()
        .arg("dispatch")
        .arg("--site")
        .arg(site.path())
        .arg("--type")
        .arg("post-field")
        .arg("--attr")
        .arg("name=slug")
        .arg("--attr")
        .arg("id=1")
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn cache_key_prints_a_digest() {
    let assert = weft()
        .args(["cache", "key", "--group", "query", r#"{"post":7}"#])
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    let digest = output.trim();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn missing_fixture_exits_with_io_status() {
    weft()
        .args(["render", "--site", "/nonexistent/weft-site.toml", "--text", "x"])
        .assert()
        .code(74)
        .stderr(contains("application error"));
}

#[test]
fn invalid_backend_exits_with_config_status() {
    weft()
        .args(["--cache-backend", "redis", "cache", "flush"])
        .assert()
        .code(78);
}
