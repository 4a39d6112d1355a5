//! Engines over a small fixture site, shared by unit tests.

use std::sync::Arc;

use super::engine::{Engine, EngineBuilder};
use super::repos::Collaborators;
use crate::cache::{Cache, CacheConfig};
use crate::domain::context::{RequestContext, Viewer};
use crate::infra::fixture::SiteFixture;

pub(crate) const SITE: &str = r#"
base_url = "https://example.com"
builder_active = true

[options]
blogname = "Example Site"
tagline = "<b>Bold</b> claims"
structured = { nested = true }

[constants]
WEFT_MODE = "production"
MAX_ITEMS = 12

[[terms]]
id = 3
taxonomy = "category"
name = "News"
slug = "news"
meta = { color = "blue" }

[[users]]
id = 5
login = "ada"
display_name = "Ada Lovelace"
email = "ada@example.com"
meta = { nickname = "countess" }

[[posts]]
id = 7
title = "Hello World"
slug = "hello-world"
excerpt = "First post"
content = "Welcome"
author_id = 5
published_at = "2024-03-01T09:30:00Z"
term_ids = [3]
meta = { price = "1234.5", subtitle = "{get:name}", tags = ["a", "b"] }

[[posts]]
id = 8
title = "Second Story"
slug = "second"
published_at = "2024-04-01T09:30:00Z"

[[attachments]]
id = 20
url = "https://cdn.example.com/clip.mp4"
"#;

pub(crate) fn site() -> Arc<SiteFixture> {
    Arc::new(SiteFixture::from_toml_str(SITE).expect("fixture parses"))
}

pub(crate) fn memory_cache() -> Arc<Cache> {
    Arc::new(Cache::from_config(&CacheConfig::default()).expect("memory cache"))
}

pub(crate) fn builder() -> EngineBuilder {
    Engine::builder(Collaborators::from_site(site()), memory_cache())
}

pub(crate) fn engine() -> Engine {
    builder().build()
}

pub(crate) fn visitor() -> RequestContext {
    RequestContext {
        current_post: Some(7),
        queried_term: Some(3),
        ..RequestContext::default()
    }
}

pub(crate) fn manager() -> RequestContext {
    RequestContext {
        viewer: Viewer::manager(5),
        ..visitor()
    }
}
