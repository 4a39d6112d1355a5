//! Attribute values carried from markup into renderers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::text::{intval, is_truthy};

/// A single attribute value. Only `Text` leaves take part in directive
/// resolution; the other variants pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Flatten to display text. Lists join with `,`; `false` is empty.
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Bool(true) => "1".to_string(),
            AttrValue::Bool(false) => String::new(),
            AttrValue::Int(number) => number.to_string(),
            AttrValue::Text(text) => text.clone(),
            AttrValue::List(items) => items
                .iter()
                .map(AttrValue::as_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Bool(flag) => !flag,
            AttrValue::Int(_) => false,
            AttrValue::Text(text) => text.is_empty(),
            AttrValue::List(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(values: Vec<T>) -> Self {
        AttrValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered attribute map with lower-cased keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(String, AttrValue)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place, keeping the original position.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<AttrValue>) {
        let key = key.as_ref().trim().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(index).1)
    }

    /// Text form of `key`, empty when absent.
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(AttrValue::as_text).unwrap_or_default()
    }

    /// Trimmed text form of `key`.
    pub fn trimmed(&self, key: &str) -> String {
        self.text(key).trim().to_string()
    }

    pub fn int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(AttrValue::Int(number)) => *number,
            Some(AttrValue::Bool(flag)) => i64::from(*flag),
            Some(other) => intval(&other.as_text()),
            None => 0,
        }
    }

    /// Attribute-style boolean (`1/true/yes/on`).
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(AttrValue::Bool(flag)) => *flag,
            Some(other) => is_truthy(&other.as_text()),
            None => false,
        }
    }

    /// Normalised `type` tag, if present and non-empty.
    pub fn type_tag(&self) -> Option<String> {
        let tag = self.trimmed("type").to_ascii_lowercase();
        (!tag.is_empty()).then_some(tag)
    }

    /// Defaults first, then any extra explicit keys; explicit values win.
    pub fn with_defaults(&self, defaults: &AttributeMap) -> AttributeMap {
        let mut merged = defaults.clone();
        for (key, value) in &self.entries {
            merged.insert(key, value.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut AttrValue> {
        self.entries.iter_mut().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeMap
where
    K: AsRef<str>,
    V: Into<AttrValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_values_override_defaults_in_default_order() {
        let defaults: AttributeMap = [("name", "post"), ("before", ""), ("fallback", "n/a")]
            .into_iter()
            .collect();
        let explicit: AttributeMap = [("fallback", "none"), ("extra", "1"), ("name", "x")]
            .into_iter()
            .collect();

        let merged = explicit.with_defaults(&defaults);
        let keys: Vec<&str> = merged.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["name", "before", "fallback", "extra"]);
        assert_eq!(merged.text("name"), "x");
        assert_eq!(merged.text("fallback"), "none");
    }

    #[test]
    fn keys_are_case_insensitive() {
        let mut map = AttributeMap::new();
        map.insert("Type", "Option");
        assert_eq!(map.text("type"), "Option");
        assert_eq!(map.type_tag().as_deref(), Some("option"));
    }

    #[test]
    fn typed_accessors() {
        let mut map = AttributeMap::new();
        map.insert("count", "12abc");
        map.insert("autoplay", "yes");
        map.insert("id", 7i64);
        map.insert("tags", vec!["a", "b"]);
        assert_eq!(map.int("count"), 12);
        assert!(map.flag("autoplay"));
        assert_eq!(map.int("id"), 7);
        assert_eq!(map.text("tags"), "a,b");
        assert!(!map.flag("missing"));
    }

    #[test]
    fn untagged_serde_shapes() {
        let parsed: AttrValue = serde_json::from_str(r#"["a", 2, true]"#).expect("parse list");
        assert_eq!(
            parsed,
            AttrValue::List(vec![
                AttrValue::Text("a".into()),
                AttrValue::Int(2),
                AttrValue::Bool(true)
            ])
        );
    }
}
