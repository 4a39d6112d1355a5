//! `link` renderer and its named URL builders.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{base_defaults, positive_id};
use crate::application::dispatch::Renderer;
use crate::application::output::wrap_output;
use crate::application::resolver::handlers::loaded;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::util::html::{clean_url, escape_html};
use crate::util::text::{sanitize_key, ucfirst};

/// Builds the URL for one link name from the normalized attributes.
pub type LinkBuilder = Arc<dyn Fn(&AttributeMap, &RenderScope<'_>) -> String + Send + Sync>;

#[derive(Clone, Default)]
pub struct LinkBuilders {
    builders: BTreeMap<String, LinkBuilder>,
}

impl LinkBuilders {
    pub fn with_builtins() -> Self {
        let mut links = Self::default();
        links.register("logout", link(|attrs, scope| {
            scope.engine().urls().logout(&attrs.text("logout_redirect"))
        }));
        links.register("login", link(|attrs, scope| {
            scope.engine().urls().login(&attrs.text("login_redirect"))
        }));
        links.register("register", link(|_, scope| scope.engine().urls().register()));
        links.register("home", link(|_, scope| scope.engine().urls().home("")));
        links.register("admin", link(|_, scope| scope.engine().urls().admin("")));
        links.register("profile", link(|_, scope| scope.engine().urls().profile()));
        links.register("siteurl", link(|_, scope| scope.engine().urls().site("")));
        links.register("current", link(|_, scope| {
            scope.engine().urls().current(scope.context())
        }));
        links.register("post", link(|attrs, scope| {
            positive_id(attrs, "id")
                .and_then(|id| loaded(scope.engine().collaborators().content.permalink(id), "permalink"))
                .unwrap_or_default()
        }));
        links.register("term", link(|attrs, scope| {
            positive_id(attrs, "id")
                .and_then(|id| loaded(scope.engine().collaborators().content.term_link(id), "term_link"))
                .unwrap_or_default()
        }));
        links.register("auth", link(|attrs, scope| {
            let urls = scope.engine().urls();
            if scope.context().is_logged_in() {
                urls.logout(&attrs.text("logout_redirect"))
            } else {
                urls.login(&attrs.text("login_redirect"))
            }
        }));
        links
    }

    /// Add or replace the builder for `name`.
    pub fn register(&mut self, name: &str, builder: LinkBuilder) {
        self.builders.insert(sanitize_key(name), builder);
    }

    pub fn get(&self, name: &str) -> Option<&LinkBuilder> {
        self.builders.get(&sanitize_key(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

/// Wrap a closure as a [`LinkBuilder`].
pub fn link<F>(build: F) -> LinkBuilder
where
    F: Fn(&AttributeMap, &RenderScope<'_>) -> String + Send + Sync + 'static,
{
    Arc::new(build)
}

pub struct LinkRenderer;

impl Renderer for LinkRenderer {
    fn type_tag(&self) -> &str {
        "link"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        for key in [
            "name",
            "login_redirect",
            "logout_redirect",
            "label",
            "label_logged_in",
            "label_logged_out",
            "target",
        ] {
            defaults.insert(key, "");
        }
        defaults.insert("id", 0);
        defaults.insert("format", "raw");
        defaults
    }

    fn render(&self, attributes: &AttributeMap, _content: &str, scope: &RenderScope<'_>) -> String {
        let name = sanitize_key(&attributes.text("name"));
        let url = scope
            .engine()
            .links()
            .get(&name)
            .map(|builder| builder(attributes, scope))
            .unwrap_or_default();
        let href = clean_url(&url);

        let value = if attributes.trimmed("format") == "anchor" {
            let label = label_for(&name, attributes, scope);
            let target = match attributes.trimmed("target") {
                target if target.is_empty() => String::new(),
                target => format!(" target=\"{}\"", escape_html(&target)),
            };
            format!(
                "<a href=\"{href}\"{target} class=\"weft-link\">{}</a>",
                escape_html(&label)
            )
        } else {
            href
        };

        scope
            .engine()
            .sanitizer()
            .clean(&wrap_output(&value, attributes))
    }
}

fn label_for(name: &str, attributes: &AttributeMap, scope: &RenderScope<'_>) -> String {
    if name == "auth" {
        let (key, default) = if scope.context().is_logged_in() {
            ("label_logged_in", "Logout")
        } else {
            ("label_logged_out", "Login")
        };
        return match attributes.text(key) {
            label if label.is_empty() => default.to_string(),
            label => label,
        };
    }

    match attributes.text("label") {
        label if label.is_empty() => ucfirst(name),
        label => label,
    }
}
