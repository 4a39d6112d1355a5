//! Site URL kinds used by `{url:...}` directives and `link` renderers.

use std::collections::BTreeMap;
use std::sync::Arc;

use url::{Url, form_urlencoded};

use crate::domain::context::RequestContext;

const LOGIN_PATH: &str = "login";
const PROFILE_PATH: &str = "profile";
pub const DEFAULT_SETTINGS_PATH: &str = "settings/weft";

/// Resolves a URL kind this module does not know about.
pub type UrlKind = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct SiteUrls {
    home: String,
    site: String,
    admin: String,
    settings_path: String,
    extensions: BTreeMap<String, UrlKind>,
}

impl Default for SiteUrls {
    fn default() -> Self {
        Self::from_bases(
            "http://localhost/",
            "http://localhost/",
            "http://localhost/admin/",
        )
    }
}

impl SiteUrls {
    pub fn new(home: &Url, site: &Url, admin: &Url) -> Self {
        Self::from_bases(home.as_str(), site.as_str(), admin.as_str())
    }

    /// Validate and normalise the three base URLs.
    pub fn parse(home: &str, site: &str, admin: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(
            &Url::parse(home)?,
            &Url::parse(site)?,
            &Url::parse(admin)?,
        ))
    }

    fn from_bases(home: &str, site: &str, admin: &str) -> Self {
        Self {
            home: with_trailing_slash(home),
            site: with_trailing_slash(site),
            admin: with_trailing_slash(admin),
            settings_path: DEFAULT_SETTINGS_PATH.to_string(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_settings_path(mut self, path: &str) -> Self {
        self.settings_path = path.trim_start_matches('/').to_string();
        self
    }

    pub fn register_kind(&mut self, kind: &str, resolver: UrlKind) {
        self.extensions
            .insert(kind.trim().to_ascii_lowercase(), resolver);
    }

    pub fn home(&self, path: &str) -> String {
        join(&self.home, path)
    }

    pub fn site(&self, path: &str) -> String {
        join(&self.site, path)
    }

    pub fn admin(&self, path: &str) -> String {
        join(&self.admin, path)
    }

    pub fn login(&self, redirect: &str) -> String {
        with_query(self.site(LOGIN_PATH), &[], redirect)
    }

    pub fn logout(&self, redirect: &str) -> String {
        with_query(self.site(LOGIN_PATH), &[("action", "logout")], redirect)
    }

    pub fn register(&self) -> String {
        with_query(self.site(LOGIN_PATH), &[("action", "register")], "")
    }

    pub fn lost_password(&self) -> String {
        with_query(self.site(LOGIN_PATH), &[("action", "lostpassword")], "")
    }

    pub fn profile(&self) -> String {
        self.admin(PROFILE_PATH)
    }

    /// Admin page where operators edit the function allowlist.
    pub fn settings(&self) -> String {
        self.admin(&self.settings_path)
    }

    /// Home URL joined with the request URI.
    pub fn current(&self, context: &RequestContext) -> String {
        self.home(&context.request_uri)
    }

    /// Resolve a named kind; `None` for unknown kinds with no extension.
    pub fn resolve(&self, kind: &str, context: &RequestContext) -> Option<String> {
        let kind = kind.trim().to_ascii_lowercase();
        let url = match kind.as_str() {
            "home" | "front" => self.home(""),
            "site" => self.site(""),
            "admin" => self.admin(""),
            "login" => self.login(""),
            "logout" => self.logout(""),
            "register" => self.register(),
            "lostpassword" | "lost-password" => self.lost_password(),
            "current" => self.current(context),
            other => return self.extensions.get(other).and_then(|kind| kind(context)),
        };
        Some(url)
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{base}{}", path.trim_start_matches('/'))
}

fn with_query(url: String, pairs: &[(&str, &str)], redirect: &str) -> String {
    let redirect = redirect.trim();
    if pairs.is_empty() && redirect.is_empty() {
        return url;
    }

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        query.append_pair(key, value);
    }
    if !redirect.is_empty() {
        query.append_pair("redirect_to", redirect);
    }
    format!("{url}?{}", query.finish())
}
