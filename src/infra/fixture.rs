//! TOML-described site used by the CLI and the tests.
//!
//! One document carries posts, terms, users, options, constants, attachment
//! URLs, page-builder templates and oEmbed responses:
//!
//! ```toml
//! base_url = "https://example.com/"
//! builder_active = true
//!
//! [options]
//! blogname = "Example"
//!
//! [[posts]]
//! id = 7
//! title = "Hello"
//! slug = "hello"
//! meta = { price = "10" }
//!
//! [[templates]]
//! id = 40
//! html = "<p>{post_field:title}</p>"
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::application::repos::{
    ConstantsRepo, ContentRepo, Embedder, MetaClause, OptionsRepo, PostQuery, RepoError,
    SearchColumn, ShortcodeExpander, SortOrder, TaxClause, TaxOperator, TemplateEngine,
    TermMatchField,
};
use crate::domain::entities::{PostRecord, TermRecord, UserRecord};
use crate::domain::error::RenderError;

use super::error::InfraError;

const DEFAULT_BASE_URL: &str = "http://localhost/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixtureDocument {
    base_url: Option<String>,
    builder_active: bool,
    /// Makes every content query fail, for error-path tests.
    fail_queries: bool,
    options: BTreeMap<String, Value>,
    constants: BTreeMap<String, Value>,
    posts: Vec<PostRecord>,
    terms: Vec<TermRecord>,
    users: Vec<UserRecord>,
    attachments: Vec<AttachmentEntry>,
    templates: Vec<TemplateEntry>,
    embeds: Vec<EmbedEntry>,
}

#[derive(Debug, Deserialize)]
struct AttachmentEntry {
    id: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    id: u64,
    #[serde(default)]
    html: String,
    #[serde(default)]
    fail: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedEntry {
    url: String,
    html: String,
}

#[derive(Debug, Default)]
pub struct SiteFixture {
    base_url: String,
    builder_active: bool,
    fail_queries: bool,
    options: BTreeMap<String, Value>,
    constants: BTreeMap<String, Value>,
    posts: BTreeMap<u64, PostRecord>,
    terms: BTreeMap<u64, TermRecord>,
    users: BTreeMap<u64, UserRecord>,
    attachments: BTreeMap<u64, String>,
    templates: BTreeMap<u64, TemplateEntry>,
    embeds: BTreeMap<String, String>,
    query_calls: AtomicUsize,
}

impl SiteFixture {
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            InfraError::Fixture { message } => {
                InfraError::fixture(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, InfraError> {
        let document: FixtureDocument =
            toml::from_str(raw).map_err(|err| InfraError::fixture(err.to_string()))?;

        let mut base_url = document
            .base_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let fixture = Self {
            base_url,
            builder_active: document.builder_active,
            fail_queries: document.fail_queries,
            options: document.options,
            constants: document.constants,
            posts: index_by_id(document.posts, |post| post.id)?,
            terms: index_by_id(document.terms, |term| term.id)?,
            users: index_by_id(document.users, |user| user.id)?,
            attachments: document
                .attachments
                .into_iter()
                .map(|entry| (entry.id, entry.url))
                .collect(),
            templates: document
                .templates
                .into_iter()
                .map(|entry| (entry.id, entry))
                .collect(),
            embeds: document
                .embeds
                .into_iter()
                .map(|entry| (entry.url, entry.html))
                .collect(),
            query_calls: AtomicUsize::new(0),
        };

        debug!(
            op = "fixture",
            posts = fixture.posts.len(),
            terms = fixture.terms.len(),
            users = fixture.users.len(),
            "Site fixture loaded"
        );
        Ok(fixture)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// How many times `query_posts` reached the fixture.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(AtomicOrdering::Relaxed)
    }

    fn post_terms<'a>(&'a self, post: &'a PostRecord) -> impl Iterator<Item = &'a TermRecord> {
        post.term_ids.iter().filter_map(|id| self.terms.get(id))
    }

    fn matches(&self, post: &PostRecord, query: &PostQuery) -> bool {
        if !list_accepts(&query.post_types, &post.post_type)
            || !list_accepts(&query.statuses, &post.status)
        {
            return false;
        }
        if query.exclude.contains(&post.id) {
            return false;
        }
        if query.author.is_some_and(|author| author != post.author_id) {
            return false;
        }
        if let Some(search) = query.search.as_deref() {
            if !search_matches(post, search, &query.search_columns) {
                return false;
            }
        }
        query
            .meta_query
            .iter()
            .all(|clause| meta_matches(post, clause))
            && query
                .tax_query
                .iter()
                .all(|clause| self.tax_matches(post, clause))
    }

    fn tax_matches(&self, post: &PostRecord, clause: &TaxClause) -> bool {
        let assigned: Vec<&TermRecord> = self
            .post_terms(post)
            .filter(|term| term.taxonomy == clause.taxonomy)
            .collect();
        let hit = |wanted: &str| {
            assigned.iter().any(|term| match clause.field {
                TermMatchField::TermId => term.id.to_string() == wanted.trim(),
                TermMatchField::Name => term.name.eq_ignore_ascii_case(wanted.trim()),
                TermMatchField::Slug => term.slug == wanted.trim(),
            })
        };

        match clause.operator {
            TaxOperator::In => clause.terms.iter().any(|wanted| hit(wanted.as_str())),
            TaxOperator::NotIn => !clause.terms.iter().any(|wanted| hit(wanted.as_str())),
            TaxOperator::And => clause.terms.iter().all(|wanted| hit(wanted.as_str())),
            TaxOperator::Exists => !assigned.is_empty(),
            TaxOperator::NotExists => assigned.is_empty(),
        }
    }
}

fn index_by_id<T>(
    records: Vec<T>,
    id_of: impl Fn(&T) -> u64,
) -> Result<BTreeMap<u64, T>, InfraError> {
    let mut indexed = BTreeMap::new();
    for record in records {
        let id = id_of(&record);
        if id == 0 {
            return Err(InfraError::fixture("record ids must be positive"));
        }
        if indexed.insert(id, record).is_some() {
            return Err(InfraError::fixture(format!("duplicate record id {id}")));
        }
    }
    Ok(indexed)
}

fn list_accepts(accepted: &[String], value: &str) -> bool {
    accepted.is_empty() || accepted.iter().any(|item| item == "any" || item == value)
}

fn search_matches(post: &PostRecord, search: &str, columns: &[SearchColumn]) -> bool {
    let needle = search.to_lowercase();
    columns.iter().any(|column| {
        let haystack = match column {
            SearchColumn::Title => &post.title,
            SearchColumn::Excerpt => &post.excerpt,
            SearchColumn::Content => &post.content,
        };
        haystack.to_lowercase().contains(&needle)
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare_values(stored: &str, expected: &str, numeric: bool) -> Option<Ordering> {
    match (stored.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(left), Ok(right)) => left.partial_cmp(&right),
        _ if numeric => None,
        _ => Some(stored.cmp(expected)),
    }
}

fn meta_matches(post: &PostRecord, clause: &MetaClause) -> bool {
    let stored = post.meta.get(&clause.key);
    match clause.compare.as_str() {
        "EXISTS" => return stored.is_some(),
        "NOT EXISTS" => return stored.is_none(),
        _ => {}
    }
    let Some(stored) = stored.map(value_text) else {
        return false;
    };
    let Some(expected) = clause.value.as_ref() else {
        return true;
    };

    let numeric = clause
        .value_type
        .as_deref()
        .is_some_and(|kind| matches!(kind, "NUMERIC" | "DECIMAL" | "SIGNED" | "UNSIGNED"));
    let expected_list: Vec<String> = match expected {
        Value::Array(items) => items.iter().map(value_text).collect(),
        other => value_text(other)
            .split(',')
            .map(|item| item.trim().to_string())
            .collect(),
    };
    let expected_text = value_text(expected);
    let ordering = || compare_values(&stored, &expected_text, numeric);
    let between = || match expected_list.as_slice() {
        [low, high] => {
            compare_values(&stored, low, numeric).is_some_and(Ordering::is_ge)
                && compare_values(&stored, high, numeric).is_some_and(Ordering::is_le)
        }
        _ => false,
    };

    match clause.compare.as_str() {
        "=" => ordering() == Some(Ordering::Equal),
        "!=" => ordering() != Some(Ordering::Equal),
        ">" => ordering() == Some(Ordering::Greater),
        ">=" => ordering().is_some_and(Ordering::is_ge),
        "<" => ordering() == Some(Ordering::Less),
        "<=" => ordering().is_some_and(Ordering::is_le),
        "LIKE" => stored
            .to_lowercase()
            .contains(&expected_text.to_lowercase()),
        "NOT LIKE" => !stored
            .to_lowercase()
            .contains(&expected_text.to_lowercase()),
        "IN" => expected_list.contains(&stored),
        "NOT IN" => !expected_list.contains(&stored),
        "BETWEEN" => between(),
        "NOT BETWEEN" => !between(),
        _ => false,
    }
}

fn sort_posts(posts: &mut [PostRecord], order_by: &str, order: SortOrder) {
    posts.sort_by(|left, right| {
        let primary = match order_by {
            "title" => left.title.to_lowercase().cmp(&right.title.to_lowercase()),
            "name" | "slug" => left.slug.cmp(&right.slug),
            "modified" => left.modified_at.cmp(&right.modified_at),
            "author" => left.author_id.cmp(&right.author_id),
            "id" => Ordering::Equal,
            _ => left.published_at.cmp(&right.published_at),
        };
        primary.then(left.id.cmp(&right.id))
    });
    if order == SortOrder::Desc {
        posts.reverse();
    }
}

impl ContentRepo for SiteFixture {
    fn post(&self, id: u64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.get(&id).cloned())
    }

    fn term(&self, id: u64) -> Result<Option<TermRecord>, RepoError> {
        Ok(self.terms.get(&id).cloned())
    }

    fn user(&self, id: u64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(&id).cloned())
    }

    fn attachment_url(&self, id: u64) -> Result<Option<String>, RepoError> {
        Ok(self.attachments.get(&id).cloned())
    }

    fn permalink(&self, post_id: u64) -> Result<Option<String>, RepoError> {
        Ok(self.posts.get(&post_id).map(|post| {
            if post.slug.is_empty() {
                format!("{}?p={}", self.base_url, post.id)
            } else {
                format!("{}{}/", self.base_url, post.slug)
            }
        }))
    }

    fn term_link(&self, term_id: u64) -> Result<Option<String>, RepoError> {
        Ok(self.terms.get(&term_id).map(|term| {
            let slug = if term.slug.is_empty() {
                term.id.to_string()
            } else {
                term.slug.clone()
            };
            format!("{}{}/{}/", self.base_url, term.taxonomy, slug)
        }))
    }

    fn query_posts(&self, query: &PostQuery) -> Result<Vec<PostRecord>, RepoError> {
        self.query_calls.fetch_add(1, AtomicOrdering::Relaxed);
        if self.fail_queries {
            return Err(RepoError::from_persistence("fixture configured to fail queries"));
        }

        let mut matched: Vec<PostRecord> = self
            .posts
            .values()
            .filter(|post| self.matches(post, query))
            .cloned()
            .collect();
        sort_posts(&mut matched, &query.order_by, query.order);

        let start = if query.offset > 0 {
            query.offset
        } else {
            query.paged.saturating_sub(1).saturating_mul(query.per_page)
        };
        Ok(matched
            .into_iter()
            .skip(start)
            .take(query.per_page)
            .collect())
    }
}

impl OptionsRepo for SiteFixture {
    fn option(&self, name: &str) -> Result<Option<Value>, RepoError> {
        Ok(self.options.get(name).cloned())
    }
}

impl ConstantsRepo for SiteFixture {
    fn constant(&self, name: &str) -> Option<Value> {
        self.constants.get(name).cloned()
    }
}

impl TemplateEngine for SiteFixture {
    fn is_active(&self) -> bool {
        self.builder_active
    }

    /// Template markup may contain directives and shortcodes, as widget
    /// output does; both are expanded through `shortcodes`.
    fn render(&self, id: u64, shortcodes: &dyn ShortcodeExpander) -> Result<String, RenderError> {
        if !self.builder_active {
            return Err(RenderError::EngineUnavailable);
        }
        match self.templates.get(&id) {
            Some(template) if template.fail => {
                Err(RenderError::failed(id, "fixture template marked as failing"))
            }
            Some(template) => Ok(shortcodes.expand(&template.html)),
            None => Ok(String::new()),
        }
    }
}

impl Embedder for SiteFixture {
    fn oembed(&self, url: &str) -> Option<String> {
        self.embeds.get(url).cloned()
    }
}
