//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::util::text::sanitize_key;

pub use cli::{
    CacheArgs, CacheCommand, CacheFlushArgs, CacheKeyArgs, CliArgs, Command, DispatchArgs,
    GlobalOverrides, RenderArgs, RequestArgs, parse_pairs,
};

use crate::application::urls::DEFAULT_SETTINGS_PATH;
use crate::cache::BackendKind;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "weft";
const DEFAULT_CACHE_DIR: &str = ".weft-cache";
const DEFAULT_CACHE_PREFIX: &str = "weft_";
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
const DEFAULT_CACHE_MEMORY_CAPACITY: u64 = 1024;
const DEFAULT_QUERY_TTL_SECS: u64 = 43_200;
const DEFAULT_MAX_PASSES: u64 = 10;
const DEFAULT_MAX_DEPTH: u64 = 10;
const DEFAULT_LOOKUP_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_HOME_URL: &str = "http://localhost/";
const DEFAULT_ADMIN_PATH: &str = "admin/";
const DEFAULT_SHORTCODE_TAG: &str = "weft";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub resolver: ResolverSettings,
    pub functions: FunctionSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: BackendKind,
    pub directory: PathBuf,
    pub prefix: String,
    pub default_ttl_seconds: u64,
    pub memory_capacity: usize,
    pub query_cache: bool,
    pub query_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub max_passes: usize,
    pub max_depth: usize,
    pub lookup_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionSettings {
    /// Extra names on top of the built-in allowlist.
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub home_url: Url,
    pub site_url: Url,
    pub admin_url: Url,
    pub settings_path: String,
    pub timezone: Tz,
    pub shortcode_tag: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("WEFT")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("functions.allowlist")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    resolver: RawResolverSettings,
    functions: RawFunctionSettings,
    site: RawSiteSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    prefix: Option<String>,
    default_ttl_seconds: Option<u64>,
    memory_capacity: Option<u64>,
    query_cache: Option<bool>,
    query_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResolverSettings {
    max_passes: Option<u64>,
    max_depth: Option<u64>,
    lookup_cache_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFunctionSettings {
    allowlist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    home_url: Option<String>,
    site_url: Option<String>,
    admin_url: Option<String>,
    settings_path: Option<String>,
    timezone: Option<String>,
    shortcode_tag: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(passes) = overrides.resolver_max_passes {
            self.resolver.max_passes = Some(passes);
        }
        if let Some(depth) = overrides.resolver_max_depth {
            self.resolver.max_depth = Some(depth);
        }
        self.functions
            .allowlist
            .extend(overrides.allow_functions.iter().cloned());
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            resolver,
            functions,
            site,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            resolver: build_resolver_settings(resolver)?,
            functions: FunctionSettings {
                allowlist: functions.allowlist,
            },
            site: build_site_settings(site)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache
        .backend
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        None | Some("memory") => BackendKind::Memory,
        Some("file") => BackendKind::File,
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}` (expected memory or file)"),
            ));
        }
    };

    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let prefix = cache
        .prefix
        .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string());
    if prefix.contains(['/', '\\']) {
        return Err(LoadError::invalid(
            "cache.prefix",
            "prefix must not contain path separators",
        ));
    }
    if sanitize_key(&prefix).is_empty() {
        return Err(LoadError::invalid(
            "cache.prefix",
            "prefix must contain at least one key character",
        ));
    }

    let default_ttl_seconds = cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if default_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;

    Ok(CacheSettings {
        backend,
        directory,
        prefix,
        default_ttl_seconds,
        memory_capacity,
        query_cache: cache.query_cache.unwrap_or(true),
        query_ttl_seconds: cache.query_ttl_seconds.unwrap_or(DEFAULT_QUERY_TTL_SECS),
    })
}

fn build_resolver_settings(resolver: RawResolverSettings) -> Result<ResolverSettings, LoadError> {
    Ok(ResolverSettings {
        max_passes: non_zero_usize(
            resolver.max_passes.unwrap_or(DEFAULT_MAX_PASSES),
            "resolver.max_passes",
        )?,
        max_depth: non_zero_usize(
            resolver.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            "resolver.max_depth",
        )?,
        lookup_cache_ttl_seconds: resolver
            .lookup_cache_ttl_seconds
            .unwrap_or(DEFAULT_LOOKUP_CACHE_TTL_SECS),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let home_url = parse_base_url(
        site.home_url.as_deref().unwrap_or(DEFAULT_HOME_URL),
        "site.home_url",
    )?;
    let site_url = match site.site_url.as_deref() {
        Some(raw) => parse_base_url(raw, "site.site_url")?,
        None => home_url.clone(),
    };
    let admin_url = match site.admin_url.as_deref() {
        Some(raw) => parse_base_url(raw, "site.admin_url")?,
        None => site_url
            .join(DEFAULT_ADMIN_PATH)
            .map_err(|err| LoadError::invalid("site.admin_url", err.to_string()))?,
    };

    let timezone = match site.timezone.as_deref().map(str::trim) {
        None | Some("") => chrono_tz::UTC,
        Some(name) => name.parse::<Tz>().map_err(|err| {
            LoadError::invalid("site.timezone", format!("unknown time zone: {err}"))
        })?,
    };

    let shortcode_tag = site
        .shortcode_tag
        .map(|tag| tag.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_SHORTCODE_TAG.to_string());
    if shortcode_tag.is_empty()
        || !shortcode_tag
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(LoadError::invalid(
            "site.shortcode_tag",
            "tag must be non-empty and contain only letters, digits, `_` or `-`",
        ));
    }

    Ok(SiteSettings {
        home_url,
        site_url,
        admin_url,
        settings_path: site
            .settings_path
            .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string()),
        timezone,
        shortcode_tag,
    })
}

/// Absolute http(s) URL; a trailing slash is added so joins stay inside it.
fn parse_base_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "URL must use http or https"));
    }
    Ok(url)
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<usize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests;
