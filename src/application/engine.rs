//! The rendering engine and its builder.
//!
//! An [`Engine`] is assembled once through [`EngineBuilder`] and is
//! read-only afterwards, so it can be shared across threads behind an `Arc`.
//! All per-request state lives in a [`RenderState`] created by each entry
//! point.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, info};

use super::allowlist::Allowlist;
use super::dispatch::{RendererFactory, RendererRegistry};
use super::format::{FormatFilter, FormatFilters};
use super::functions::{FunctionRegistry, HostFunction};
use super::hooks::Hooks;
use super::output::Sanitizer;
use super::query::QueryService;
use super::renderers::{self, link::{LinkBuilder, LinkBuilders}};
use super::repos::Collaborators;
use super::resolver::{DirectiveResolver, Handler};
use super::scope::{RenderScope, RenderState};
use super::urls::{SiteUrls, UrlKind};
use crate::cache::Cache;
use crate::config::Settings;
use crate::domain::attributes::AttributeMap;
use crate::domain::context::RequestContext;

pub const DEFAULT_SHORTCODE_TAG: &str = "weft";
const DEFAULT_MAX_PASSES: usize = 10;
const DEFAULT_MAX_DEPTH: usize = 10;
const DEFAULT_LOOKUP_TTL_SECS: u64 = 300;
const DEFAULT_QUERY_TTL_SECS: u64 = 43_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Whole-text resolution passes per resolve call.
    pub max_passes: usize,
    /// Shared budget for nested directives and nested dispatch.
    pub max_depth: usize,
    /// TTL for cached option/constant lookups; zero disables caching.
    pub lookup_cache_ttl: u64,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_depth: DEFAULT_MAX_DEPTH,
            lookup_cache_ttl: DEFAULT_LOOKUP_TTL_SECS,
        }
    }
}

/// Rendered HTML plus the script handles it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedFragment {
    pub html: String,
    pub assets: Vec<String>,
}

pub struct Engine {
    collaborators: Collaborators,
    cache: Arc<Cache>,
    queries: QueryService,
    functions: FunctionRegistry,
    allowlist: Allowlist,
    urls: SiteUrls,
    resolver: DirectiveResolver,
    renderers: RendererRegistry,
    links: LinkBuilders,
    formats: FormatFilters,
    hooks: Hooks,
    sanitizer: Sanitizer,
    limits: EngineLimits,
    shortcode_tag: String,
    timezone: Tz,
}

impl Engine {
    pub fn builder(collaborators: Collaborators, cache: Arc<Cache>) -> EngineBuilder {
        EngineBuilder::new(collaborators, cache)
    }

    /// Render one `type_tag` invocation.
    pub fn render(
        &self,
        context: &RequestContext,
        type_tag: &str,
        mut attributes: AttributeMap,
        content: &str,
    ) -> String {
        attributes.insert("type", type_tag);
        self.render_attributes(context, attributes, content)
    }

    /// Render an invocation whose `type` is one of the attributes.
    pub fn render_attributes(
        &self,
        context: &RequestContext,
        attributes: AttributeMap,
        content: &str,
    ) -> String {
        self.render_fragment(context, attributes, content).html
    }

    pub fn render_fragment(
        &self,
        context: &RequestContext,
        attributes: AttributeMap,
        content: &str,
    ) -> RenderedFragment {
        self.with_scope(context, |scope| scope.dispatch(attributes, content))
    }

    /// Expand shortcodes in free text, resolving directives between them.
    pub fn expand(&self, context: &RequestContext, text: &str) -> String {
        self.expand_fragment(context, text).html
    }

    pub fn expand_fragment(&self, context: &RequestContext, text: &str) -> RenderedFragment {
        self.with_scope(context, |scope| scope.expand_text(text))
    }

    /// Resolve directives only.
    pub fn resolve(&self, context: &RequestContext, text: &str) -> String {
        self.with_scope(context, |scope| scope.resolve_text(text)).html
    }

    fn with_scope<F>(&self, context: &RequestContext, run: F) -> RenderedFragment
    where
        F: FnOnce(&RenderScope<'_>) -> String,
    {
        let state = RenderState::new(self.limits.max_depth);
        let scope = RenderScope::new(self, context, &state);
        let html = run(&scope);
        RenderedFragment {
            html,
            assets: state.assets(),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn queries(&self) -> &QueryService {
        &self.queries
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    pub fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    pub fn resolver(&self) -> &DirectiveResolver {
        &self.resolver
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    pub fn links(&self) -> &LinkBuilders {
        &self.links
    }

    pub fn formats(&self) -> &FormatFilters {
        &self.formats
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    pub fn shortcode_tag(&self) -> &str {
        &self.shortcode_tag
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

pub struct EngineBuilder {
    collaborators: Collaborators,
    cache: Arc<Cache>,
    functions: FunctionRegistry,
    allowlist: Vec<String>,
    urls: SiteUrls,
    resolver: DirectiveResolver,
    renderers: RendererRegistry,
    links: LinkBuilders,
    formats: FormatFilters,
    hooks: Hooks,
    limits: EngineLimits,
    shortcode_tag: String,
    timezone: Tz,
    query_cache: bool,
    query_ttl: u64,
}

impl EngineBuilder {
    /// Builder with every built-in handler, renderer, link and function.
    pub fn new(collaborators: Collaborators, cache: Arc<Cache>) -> Self {
        let mut renderers = RendererRegistry::new();
        renderers::register_builtins(&mut renderers);

        Self {
            collaborators,
            cache,
            functions: FunctionRegistry::with_builtins(),
            allowlist: Vec::new(),
            urls: SiteUrls::default(),
            resolver: DirectiveResolver::with_builtins(),
            renderers,
            links: LinkBuilders::with_builtins(),
            formats: FormatFilters::default(),
            hooks: Hooks::default(),
            limits: EngineLimits::default(),
            shortcode_tag: DEFAULT_SHORTCODE_TAG.to_string(),
            timezone: chrono_tz::UTC,
            query_cache: true,
            query_ttl: DEFAULT_QUERY_TTL_SECS,
        }
    }

    /// Apply validated settings: site URLs, limits, allowlist and caching.
    pub fn from_settings(
        collaborators: Collaborators,
        cache: Arc<Cache>,
        settings: &Settings,
    ) -> Self {
        let site = &settings.site;
        let urls = SiteUrls::new(&site.home_url, &site.site_url, &site.admin_url)
            .with_settings_path(&site.settings_path);

        Self::new(collaborators, cache)
            .urls(urls)
            .timezone(site.timezone)
            .shortcode_tag(&site.shortcode_tag)
            .limits(EngineLimits {
                max_passes: settings.resolver.max_passes,
                max_depth: settings.resolver.max_depth,
                lookup_cache_ttl: settings.resolver.lookup_cache_ttl_seconds,
            })
            .allow_functions(settings.functions.allowlist.iter().cloned())
            .query_cache(settings.cache.query_cache, settings.cache.query_ttl_seconds)
    }

    pub fn urls(mut self, urls: SiteUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn shortcode_tag(mut self, tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if !tag.is_empty() {
            self.shortcode_tag = tag;
        }
        self
    }

    /// Extend the default allowlist; names must also be registered.
    pub fn allow_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowlist
            .extend(names.into_iter().map(|name| name.as_ref().to_string()));
        self
    }

    pub fn query_cache(mut self, enabled: bool, ttl_seconds: u64) -> Self {
        self.query_cache = enabled;
        self.query_ttl = ttl_seconds;
        self
    }

    pub fn register_function(mut self, name: &str, function: HostFunction) -> Self {
        self.functions.register(name, function);
        self
    }

    pub fn register_renderer(mut self, type_tag: &str, factory: RendererFactory) -> Self {
        self.renderers.register(type_tag, factory);
        self
    }

    pub fn register_handler(mut self, aliases: &[&str], handler: Handler) -> Self {
        self.resolver.register(aliases, handler);
        self
    }

    pub fn register_link(mut self, name: &str, builder: LinkBuilder) -> Self {
        self.links.register(name, builder);
        self
    }

    pub fn register_format(mut self, kind: &str, filter: FormatFilter) -> Self {
        self.formats.register(kind, filter);
        self
    }

    pub fn register_url_kind(mut self, kind: &str, resolver: UrlKind) -> Self {
        self.urls.register_kind(kind, resolver);
        self
    }

    /// Observers and filters fired around each dispatch.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn build(self) -> Engine {
        let allowlist = Allowlist::build(&self.allowlist, &self.functions);
        let queries = QueryService::new(Arc::clone(&self.cache), self.query_cache, self.query_ttl);

        debug!(
            allowlisted = allowlist.len(),
            renderers = self.renderers.type_tags().count(),
            aliases = self.resolver.aliases().count(),
            "Engine components registered"
        );
        info!(
            backend = self.cache.backend_name(),
            shortcode_tag = %self.shortcode_tag,
            max_passes = self.limits.max_passes,
            max_depth = self.limits.max_depth,
            "Rendering engine ready"
        );

        Engine {
            collaborators: self.collaborators,
            cache: self.cache,
            queries,
            functions: self.functions,
            allowlist,
            urls: self.urls,
            resolver: self.resolver,
            renderers: self.renderers,
            links: self.links,
            formats: self.formats,
            hooks: self.hooks,
            sanitizer: Sanitizer::new(),
            limits: self.limits,
            shortcode_tag: self.shortcode_tag,
            timezone: self.timezone,
        }
    }
}
