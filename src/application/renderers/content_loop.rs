//! `loop` renderer: runs a post query and renders its body once per result.
//!
//! The body is split on `[weft else]`; the part after the marker renders
//! when the query returns nothing.

use serde_json::Value;
use tracing::debug;

use super::base_defaults;
use crate::application::dispatch::Renderer;
use crate::application::output::Profile;
use crate::application::repos::{
    MetaClause, PostQuery, SearchColumn, SortOrder, TaxClause, TaxOperator, TermMatchField,
};
use crate::application::resolver::handlers::loaded;
use crate::application::scope::RenderScope;
use crate::application::shortcode::split_else;
use crate::domain::attributes::AttributeMap;
use crate::util::html::strip_tags;
use crate::util::text::{sanitize_key, sanitize_text_field};

const FALLBACK_PER_PAGE: usize = 10;

pub struct LoopRenderer;

impl Renderer for LoopRenderer {
    fn type_tag(&self) -> &str {
        "loop"
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("name", "post");
        defaults.insert("post_type", "post");
        defaults.insert("posts_per_page", 3);
        defaults.insert("orderby", "date");
        defaults.insert("order", "DESC");
        defaults.insert("author", "");
        defaults.insert("paged", 1);
        defaults.insert("offset", 0);
        defaults.insert("post_status", "publish");
        for key in [
            "s",
            "meta_key",
            "meta_value",
            "meta_compare",
            "meta_query",
            "tax_query",
            "search_in",
        ] {
            defaults.insert(key, "");
        }
        defaults.insert("exclude_current", "0");
        defaults
    }

    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String {
        if !attributes.trimmed("name").eq_ignore_ascii_case("post") {
            return String::new();
        }

        let engine = scope.engine();
        let (item_template, else_template) = split_else(content, engine.shortcode_tag());

        let mut query = build_query(attributes);
        // Only an explicit "0" turns exclusion off.
        if attributes.trimmed("exclude_current") != "0" {
            if let Some(container) = container_to_exclude(&query, attributes, scope) {
                query.exclude.push(container);
            }
        }

        let posts = engine
            .queries()
            .posts(engine.collaborators().content.as_ref(), &query);
        debug!(op = "loop", results = posts.len(), "Loop query finished");

        if posts.is_empty() {
            if else_template.trim().is_empty() {
                return String::new();
            }
            return engine.sanitizer().clean(&scope.expand_text(else_template));
        }

        let mut rendered = String::new();
        for post in &posts {
            let item_context = scope.context().with_current_post(post.id);
            let item_scope = scope.with_context(&item_context);
            rendered.push_str(&item_scope.expand_text(item_template));
        }

        super::finish_html(&rendered, attributes, scope, Profile::Post)
    }
}

/// Translate loop attributes into a content query.
pub fn build_query(attributes: &AttributeMap) -> PostQuery {
    let mut query = PostQuery::default();

    let post_types = split_list(&attributes.text("post_type"));
    if !post_types.is_empty() {
        query.post_types = post_types;
    }
    let statuses = split_list(&attributes.text("post_status"));
    if !statuses.is_empty() {
        query.statuses = statuses;
    }

    let per_page = attributes.int("posts_per_page");
    query.per_page = usize::try_from(per_page)
        .ok()
        .filter(|per_page| *per_page > 0)
        .unwrap_or(FALLBACK_PER_PAGE);
    query.paged = usize::try_from(attributes.int("paged")).unwrap_or(1).max(1);
    query.offset = usize::try_from(attributes.int("offset")).unwrap_or(0);

    let order_by = sanitize_text_field(&attributes.text("orderby"));
    if !order_by.is_empty() {
        query.order_by = order_by.to_ascii_lowercase();
    }
    query.order = if attributes.trimmed("order").eq_ignore_ascii_case("asc") {
        SortOrder::Asc
    } else {
        SortOrder::Desc
    };
    query.author = u64::try_from(attributes.int("author")).ok().filter(|id| *id > 0);

    let search = attributes.trimmed("s");
    if !search.is_empty() {
        query.search = Some(search);
        query.search_columns = search_columns(&attributes.trimmed("search_in"));
    }

    let meta_key = sanitize_key(&attributes.text("meta_key"));
    if !meta_key.is_empty() {
        let value = sanitize_text_field(&attributes.text("meta_value"));
        let compare = attributes.trimmed("meta_compare").to_ascii_uppercase();
        query.meta_query.push(MetaClause {
            key: meta_key,
            value: (!value.is_empty()).then_some(Value::String(value)),
            compare: if compare.is_empty() { "=".to_string() } else { compare },
            value_type: None,
        });
    }
    query.meta_query.extend(parse_meta_query(&attributes.text("meta_query")));
    query.tax_query = parse_tax_query(&attributes.text("tax_query"));

    query
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(sanitize_text_field)
        .filter(|item| !item.is_empty())
        .collect()
}

fn search_columns(mode: &str) -> Vec<SearchColumn> {
    match mode.to_ascii_lowercase().as_str() {
        "title" => vec![SearchColumn::Title],
        "title_excerpt" | "excerpt_title" => vec![SearchColumn::Title, SearchColumn::Excerpt],
        _ => vec![SearchColumn::Title, SearchColumn::Excerpt, SearchColumn::Content],
    }
}

fn json_rows(raw: &str) -> Vec<serde_json::Map<String, Value>> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(rows)) => rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(err) => {
            debug!(op = "loop", error = %err, "Ignoring malformed query JSON");
            Vec::new()
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => sanitize_text_field(text),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

pub fn parse_meta_query(raw: &str) -> Vec<MetaClause> {
    json_rows(raw)
        .into_iter()
        .filter_map(|row| {
            let key = row.get("key").map(text_of).map(|key| sanitize_key(&key))?;
            let value = row.get("value").map(|value| match value {
                Value::Array(items) => Value::Array(
                    items.iter().map(|item| Value::String(text_of(item))).collect(),
                ),
                other => Value::String(text_of(other)),
            });
            let compare = row
                .get("compare")
                .map(|compare| text_of(compare).to_ascii_uppercase())
                .filter(|compare| !compare.is_empty())
                .unwrap_or_else(|| "=".to_string());
            let value_type = row
                .get("type")
                .map(|kind| text_of(kind).to_ascii_uppercase());
            Some(MetaClause {
                key,
                value,
                compare,
                value_type,
            })
        })
        .collect()
}

pub fn parse_tax_query(raw: &str) -> Vec<TaxClause> {
    json_rows(raw)
        .into_iter()
        .filter_map(|row| {
            let taxonomy = row.get("taxonomy").map(|value| sanitize_key(&text_of(value)))?;
            if taxonomy.is_empty() {
                return None;
            }
            let field = match row.get("field").and_then(Value::as_str) {
                Some("term_id") => TermMatchField::TermId,
                Some("name") => TermMatchField::Name,
                _ => TermMatchField::Slug,
            };
            let terms = match row.get("terms") {
                Some(Value::Array(items)) => items.iter().map(text_of).collect(),
                Some(other) => vec![text_of(other)],
                None => Vec::new(),
            };
            let operator = match row.get("operator").and_then(Value::as_str) {
                Some("NOT IN") => TaxOperator::NotIn,
                Some("AND") => TaxOperator::And,
                Some("EXISTS") => TaxOperator::Exists,
                Some("NOT EXISTS") => TaxOperator::NotExists,
                _ => TaxOperator::In,
            };
            Some(TaxClause {
                taxonomy,
                field,
                terms,
                operator,
            })
        })
        .collect()
}

/// The current post, when a search would otherwise list the page that
/// hosts the loop.
fn container_to_exclude(
    query: &PostQuery,
    attributes: &AttributeMap,
    scope: &RenderScope<'_>,
) -> Option<u64> {
    let search = query.search.as_deref()?;
    let container_id = scope.context().current_post?;
    let container = loaded(
        scope.engine().collaborators().content.post(container_id),
        "post",
    )?;

    let policy = attributes.trimmed("search_in").to_ascii_lowercase();
    let mut haystack = String::new();
    if matches!(policy.as_str(), "title" | "title_excerpt" | "excerpt_title" | "all" | "") {
        haystack.push(' ');
        haystack.push_str(&container.title);
    }
    if matches!(policy.as_str(), "title_excerpt" | "excerpt_title" | "all" | "") {
        haystack.push(' ');
        haystack.push_str(&container.excerpt);
    }
    if matches!(policy.as_str(), "all" | "") {
        haystack.push(' ');
        haystack.push_str(&container.content);
    }

    let haystack = strip_tags(&haystack).to_lowercase();
    haystack
        .contains(&search.to_lowercase())
        .then_some(container_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn non_positive_page_size_falls_back() {
        assert_eq!(build_query(&attrs(&[("posts_per_page", "0")])).per_page, 10);
        assert_eq!(build_query(&attrs(&[("posts_per_page", "-4")])).per_page, 10);
        assert_eq!(build_query(&attrs(&[("posts_per_page", "5")])).per_page, 5);
    }

    #[test]
    fn search_columns_follow_search_in() {
        let query = build_query(&attrs(&[("s", "rust"), ("search_in", "title")]));
        assert_eq!(query.search.as_deref(), Some("rust"));
        assert_eq!(query.search_columns, vec![SearchColumn::Title]);

        let query = build_query(&attrs(&[("s", "rust"), ("search_in", "excerpt_title")]));
        assert_eq!(
            query.search_columns,
            vec![SearchColumn::Title, SearchColumn::Excerpt]
        );
    }

    #[test]
    fn simple_meta_attributes_become_a_clause() {
        let query = build_query(&attrs(&[
            ("meta_key", "Featured"),
            ("meta_value", "yes"),
            ("meta_compare", "!="),
        ]));
        assert_eq!(
            query.meta_query,
            vec![MetaClause {
                key: "featured".to_string(),
                value: Some(Value::String("yes".to_string())),
                compare: "!=".to_string(),
                value_type: None,
            }]
        );
    }

    #[test]
    fn json_clauses_are_sanitized() {
        let meta = parse_meta_query(
            r#"[{"key":"Price","value":["10","20"],"compare":"between","type":"numeric"}, 7]"#,
        );
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].key, "price");
        assert_eq!(meta[0].compare, "BETWEEN");
        assert_eq!(meta[0].value_type.as_deref(), Some("NUMERIC"));

        let tax = parse_tax_query(
            r#"[{"taxonomy":"category","field":"bogus","terms":"news","operator":"NOT IN"},{"terms":"x"}]"#,
        );
        assert_eq!(
            tax,
            vec![TaxClause {
                taxonomy: "category".to_string(),
                field: TermMatchField::Slug,
                terms: vec!["news".to_string()],
                operator: TaxOperator::NotIn,
            }]
        );
        assert!(parse_tax_query("not json").is_empty());
    }

    #[test]
    fn order_and_types() {
        let query = build_query(&attrs(&[
            ("post_type", "post, page"),
            ("order", "asc"),
            ("orderby", "Title"),
        ]));
        assert_eq!(query.post_types, vec!["post", "page"]);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.order_by, "title");
    }
}
