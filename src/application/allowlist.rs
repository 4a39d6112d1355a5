//! Allowlist guarding which host functions markup may invoke.

use std::collections::BTreeSet;

use super::functions::FunctionRegistry;

/// Curated helpers every site may call without extra configuration.
pub const DEFAULT_ALLOWLIST: &[&str] = &[
    "date",
    "current_year",
    "strtoupper",
    "strtolower",
    "ucfirst",
    "ucwords",
    "trim",
    "strlen",
    "word_count",
    "implode",
    "number_format",
    "max",
    "min",
    "abs",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    names: BTreeSet<String>,
}

impl Allowlist {
    /// Default set plus operator entries, restricted to registered functions.
    pub fn build<I, S>(configured: I, registry: &FunctionRegistry) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = DEFAULT_ALLOWLIST
            .iter()
            .map(|name| name.to_string())
            .chain(normalize_entries(configured))
            .filter(|name| registry.contains(name))
            .collect();
        Self { names }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Trim, lower-case, drop empties and duplicates, keeping first-seen order.
pub fn normalize_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

/// Split a free-form settings field (one name per line or comma-separated).
pub fn parse_entries(raw: &str) -> Vec<String> {
    normalize_entries(raw.split(['\n', ',']))
}

#[cfg(test)]
mod tests {
    use crate::application::functions::host;

    use super::*;

    #[test]
    fn defaults_are_allowed() {
        let allowlist = Allowlist::build(Vec::<String>::new(), &FunctionRegistry::with_builtins());
        assert!(allowlist.allows("strtoupper"));
        assert!(allowlist.allows("  StrToUpper "));
        assert!(!allowlist.allows("str_repeat"));
    }

    #[test]
    fn configured_entries_extend_defaults_when_registered() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register("site_motto", host(|_| Ok("Carpe diem".to_string())));

        let allowlist = Allowlist::build(
            [" str_repeat ", "", "site_motto", "phpinfo", "site_motto"],
            &registry,
        );
        assert!(allowlist.allows("str_repeat"));
        assert!(allowlist.allows("site_motto"));
        assert!(!allowlist.allows("phpinfo"));
    }

    #[test]
    fn parse_entries_accepts_lines_and_commas() {
        assert_eq!(
            parse_entries("date\n  strlen , date,\n\nTRIM"),
            vec!["date", "strlen", "trim"]
        );
    }
}
