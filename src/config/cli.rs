use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the weft binary.
#[derive(Debug, Parser)]
#[command(name = "weft", version, about = "Directive and shortcode renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WEFT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve directives and expand shortcodes in a piece of text.
    Render(Box<RenderArgs>),
    /// Render a single type with explicit attributes.
    Dispatch(Box<DispatchArgs>),
    /// Cache maintenance.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the cache backend (memory|file).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,

    /// Override the file cache directory.
    #[arg(long = "cache-directory", value_name = "PATH", global = true)]
    pub cache_directory: Option<PathBuf>,

    /// Override the maximum number of resolver passes.
    #[arg(long = "resolver-max-passes", value_name = "COUNT", global = true)]
    pub resolver_max_passes: Option<u64>,

    /// Override the nesting limit for directives and shortcodes.
    #[arg(long = "resolver-max-depth", value_name = "COUNT", global = true)]
    pub resolver_max_depth: Option<u64>,

    /// Additional allowlisted functions, comma separated.
    #[arg(
        long = "allow-function",
        value_name = "NAME",
        value_delimiter = ',',
        global = true
    )]
    pub allow_functions: Vec<String>,
}

/// The simulated request a render runs under.
#[derive(Debug, Args, Default, Clone)]
pub struct RequestArgs {
    /// Site fixture describing content, options and constants.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub site: PathBuf,

    /// Query-string parameter (`key=value`), repeatable.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Form body parameter (`key=value`), repeatable.
    #[arg(long = "body", value_name = "KEY=VALUE")]
    pub body: Vec<String>,

    /// Cookie (`key=value`), repeatable.
    #[arg(long = "cookie", value_name = "KEY=VALUE")]
    pub cookie: Vec<String>,

    /// Session entry (`key=value`), repeatable.
    #[arg(long = "session", value_name = "KEY=VALUE")]
    pub session: Vec<String>,

    /// Server variable (`KEY=value`), repeatable.
    #[arg(long = "server", value_name = "KEY=VALUE")]
    pub server: Vec<String>,

    /// Request URI used for `current` URLs.
    #[arg(long = "uri", value_name = "URI", default_value = "/")]
    pub request_uri: String,

    /// Current post id.
    #[arg(long = "post", value_name = "ID")]
    pub post: Option<u64>,

    /// Queried term id.
    #[arg(long = "term", value_name = "ID")]
    pub term: Option<u64>,

    /// Logged-in user id.
    #[arg(long = "user", value_name = "ID")]
    pub user: Option<u64>,

    /// Treat the viewer as a site manager.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub manage: bool,

    /// Render as if on an admin screen.
    #[arg(long = "admin-screen", action = clap::ArgAction::SetTrue)]
    pub admin_screen: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Inline text to render.
    #[arg(long, value_name = "TEXT", conflicts_with = "input")]
    pub text: Option<String>,

    /// File whose contents are rendered; stdin when neither is given.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Print queued asset handles after the output.
    #[arg(long = "show-assets", action = clap::ArgAction::SetTrue)]
    pub show_assets: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DispatchArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Renderer type tag.
    #[arg(long = "type", value_name = "TYPE")]
    pub type_tag: String,

    /// Attribute (`key=value`), repeatable.
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    pub attributes: Vec<String>,

    /// Enclosed content.
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub content: String,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Drop one group, or everything.
    Flush(CacheFlushArgs),
    /// Print the key derived for a JSON payload.
    Key(CacheKeyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CacheFlushArgs {
    /// Group to flush; every entry when omitted.
    #[arg(long, value_name = "GROUP")]
    pub group: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheKeyArgs {
    /// Cache group.
    #[arg(long, value_name = "GROUP", default_value = "default")]
    pub group: String,

    /// JSON payload; a bare string is used when it does not parse.
    #[arg(value_name = "PAYLOAD")]
    pub payload: String,
}

/// Split a repeatable `key=value` flag; entries without `=` map to "".
pub fn parse_pairs(entries: &[String]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
