//! Content entities as exposed by the site's persistence layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const STORED_DATETIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

fn default_post_type() -> String {
    "post".to_string()
}

fn default_status() -> String {
    "publish".to_string()
}

fn format_stored(value: Option<OffsetDateTime>) -> Option<String> {
    value.and_then(|instant| instant.format(STORED_DATETIME).ok())
}

/// String-typed meta only; structured values are not exposed as text.
fn meta_text(meta: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match meta.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: u64,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub author_id: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub term_ids: Vec<u64>,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl PostRecord {
    /// Read a column by host name (`post_title`) or short name (`title`).
    pub fn field(&self, name: &str) -> Option<String> {
        let lowered = name.trim().to_ascii_lowercase();
        let key = lowered.strip_prefix("post_").unwrap_or(&lowered);
        match key {
            "id" => Some(self.id.to_string()),
            "type" => Some(self.post_type.clone()),
            "name" | "slug" => Some(self.slug.clone()),
            "title" => Some(self.title.clone()),
            "excerpt" => Some(self.excerpt.clone()),
            "content" => Some(self.content.clone()),
            "status" => Some(self.status.clone()),
            "author" => Some(self.author_id.to_string()),
            "date" => format_stored(self.published_at),
            "modified" => format_stored(self.modified_at),
            _ => None,
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn meta_text(&self, key: &str) -> Option<String> {
        meta_text(&self.meta, key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: u64,
    pub taxonomy: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl TermRecord {
    pub fn field(&self, name: &str) -> Option<String> {
        let lowered = name.trim().to_ascii_lowercase();
        let key = lowered.strip_prefix("term_").unwrap_or(&lowered);
        match key {
            "id" => Some(self.id.to_string()),
            "taxonomy" => Some(self.taxonomy.clone()),
            "name" => Some(self.name.clone()),
            "slug" => Some(self.slug.clone()),
            "description" => Some(self.description.clone()),
            "parent" => Some(self.parent.to_string()),
            "count" => Some(self.count.to_string()),
            _ => None,
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn meta_text(&self, key: &str) -> Option<String> {
        meta_text(&self.meta, key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub nicename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub registered: Option<OffsetDateTime>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl UserRecord {
    /// Credentials are never part of the record, so no field leaks them.
    pub fn field(&self, name: &str) -> Option<String> {
        let lowered = name.trim().to_ascii_lowercase();
        let key = lowered.strip_prefix("user_").unwrap_or(&lowered);
        match key {
            "id" => Some(self.id.to_string()),
            "login" => Some(self.login.clone()),
            "email" => Some(self.email.clone()),
            "display_name" | "name" => Some(self.display_name.clone()),
            "nicename" => Some(self.nicename.clone()),
            "url" => Some(self.url.clone()),
            "registered" => format_stored(self.registered),
            "roles" => Some(self.roles.join(",")),
            _ => None,
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn meta_text(&self, key: &str) -> Option<String> {
        meta_text(&self.meta, key)
    }
}
