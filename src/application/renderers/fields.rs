//! Options plus post, term and user fields and meta.

use serde_json::Value;

use super::{base_defaults, finish_value, positive_id};
use crate::application::dispatch::Renderer;
use crate::application::resolver::handlers::loaded;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::domain::entities::TermRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Option,
    PostField,
    PostMeta,
    TermField,
    TermMeta,
    UserField,
    UserMeta,
}

impl FieldSource {
    pub const ALL: [FieldSource; 7] = [
        FieldSource::Option,
        FieldSource::PostField,
        FieldSource::PostMeta,
        FieldSource::TermField,
        FieldSource::TermMeta,
        FieldSource::UserField,
        FieldSource::UserMeta,
    ];

    pub fn type_tag(self) -> &'static str {
        match self {
            FieldSource::Option => "option",
            FieldSource::PostField => "post-field",
            FieldSource::PostMeta => "post-meta",
            FieldSource::TermField => "term-field",
            FieldSource::TermMeta => "term-meta",
            FieldSource::UserField => "user-field",
            FieldSource::UserMeta => "user-meta",
        }
    }
}

pub struct FieldRenderer {
    source: FieldSource,
}

impl FieldRenderer {
    pub fn new(source: FieldSource) -> Self {
        Self { source }
    }

    fn lookup(&self, attributes: &AttributeMap, scope: &RenderScope<'_>) -> Value {
        let content = &scope.engine().collaborators().content;
        let name = attributes.trimmed("name");
        let id = positive_id(attributes, "id");

        let found = match self.source {
            FieldSource::Option => {
                if name.is_empty() {
                    return Value::Null;
                }
                loaded(scope.engine().collaborators().options.option(&name), "option")
            }
            FieldSource::PostField => id
                .and_then(|id| loaded(content.post(id), "post"))
                .and_then(|post| post.field(&name))
                .map(Value::String),
            FieldSource::PostMeta => id
                .and_then(|id| loaded(content.post(id), "post"))
                .and_then(|post| post.meta(&name).cloned()),
            FieldSource::TermField => term_for(attributes, scope)
                .and_then(|term| term.field(&name))
                .map(Value::String),
            FieldSource::TermMeta => {
                let key = match attributes.trimmed("key") {
                    key if key.is_empty() => name,
                    key => key,
                };
                term_for(attributes, scope).and_then(|term| term.meta(&key).cloned())
            }
            FieldSource::UserField => id
                .and_then(|id| loaded(content.user(id), "user"))
                .and_then(|user| user.field(&name))
                .map(Value::String),
            FieldSource::UserMeta => id
                .and_then(|id| loaded(content.user(id), "user"))
                .and_then(|user| user.meta(&name).cloned()),
        };
        found.unwrap_or(Value::Null)
    }
}

/// Explicit `id`, or the queried term when its taxonomy matches the
/// optional `taxonomy` attribute.
fn term_for(attributes: &AttributeMap, scope: &RenderScope<'_>) -> Option<TermRecord> {
    let content = &scope.engine().collaborators().content;
    if let Some(id) = positive_id(attributes, "id") {
        return loaded(content.term(id), "term");
    }

    let taxonomy = attributes.trimmed("taxonomy");
    let queried = scope.context().queried_term?;
    loaded(content.term(queried), "term")
        .filter(|term| taxonomy.is_empty() || term.taxonomy == taxonomy)
}

impl Renderer for FieldRenderer {
    fn type_tag(&self) -> &str {
        self.source.type_tag()
    }

    fn defaults(&self, scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        defaults.insert("name", "");
        let context = scope.context();
        let current = match self.source {
            FieldSource::Option => None,
            FieldSource::PostField | FieldSource::PostMeta => Some(context.current_post),
            FieldSource::TermField | FieldSource::TermMeta => {
                defaults.insert("taxonomy", "");
                defaults.insert("key", "");
                Some(None)
            }
            FieldSource::UserField | FieldSource::UserMeta => Some(context.viewer.user_id),
        };
        if let Some(current) = current {
            let id = current.and_then(|id| i64::try_from(id).ok()).unwrap_or(0);
            defaults.insert("id", id);
        }
        defaults
    }

    fn render(&self, attributes: &AttributeMap, content: &str, scope: &RenderScope<'_>) -> String {
        let value = self.lookup(attributes, scope);
        let html = finish_value(&value, attributes, scope);

        match self.source {
            FieldSource::PostField | FieldSource::TermMeta if !content.is_empty() => {
                html + &scope.expand_text(content)
            }
            _ => html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_has_a_distinct_tag() {
        let mut tags: Vec<_> = FieldSource::ALL.iter().map(|source| source.type_tag()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), FieldSource::ALL.len());
    }
}
