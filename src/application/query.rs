//! Memoized content queries.
//!
//! Results are stored in the `query` cache group under a key derived from
//! the query kind and its arguments.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::warn;

use crate::application::repos::{ContentRepo, PostQuery};
use crate::cache::Cache;
use crate::domain::entities::PostRecord;

pub const QUERY_GROUP: &str = "query";

#[derive(Clone)]
pub struct QueryService {
    cache: Arc<Cache>,
    enabled: bool,
    default_ttl: u64,
}

impl QueryService {
    pub fn new(cache: Arc<Cache>, enabled: bool, default_ttl: u64) -> Self {
        Self {
            cache,
            enabled,
            default_ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn key<P: Serialize + ?Sized>(&self, kind: &str, payload: &P) -> String {
        self.cache
            .build_key(&json!({ "kind": kind, "payload": payload }), QUERY_GROUP)
    }

    /// `None` when the call should bypass the cache.
    fn effective_ttl(&self, ttl: Option<u64>) -> Option<u64> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        (self.enabled && ttl > 0).then_some(ttl)
    }

    /// Memoize `compute` under (`kind`, `payload`). `ttl` overrides the
    /// configured default; `Some(0)` bypasses the cache.
    pub fn cached<P, T, F>(&self, kind: &str, payload: &P, ttl: Option<u64>, compute: F) -> T
    where
        P: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.effective_ttl(ttl) {
            Some(ttl) => self
                .cache
                .remember(&self.key(kind, payload), ttl, QUERY_GROUP, compute),
            None => compute(),
        }
    }

    /// Run a post listing. Repository failures yield an empty list and are
    /// not cached.
    pub fn posts(&self, repo: &dyn ContentRepo, query: &PostQuery) -> Vec<PostRecord> {
        let Some(ttl) = self.effective_ttl(None) else {
            return run_posts(repo, query).unwrap_or_default();
        };

        let key = self.key("posts", query);
        if let Some(hit) = self.cache.get::<Vec<PostRecord>>(&key, QUERY_GROUP) {
            return hit;
        }
        match run_posts(repo, query) {
            Some(posts) => {
                self.cache.set(&key, &posts, ttl, QUERY_GROUP);
                posts
            }
            None => Vec::new(),
        }
    }

    pub fn clear_key<P: Serialize + ?Sized>(&self, kind: &str, payload: &P) -> bool {
        self.cache.delete(&self.key(kind, payload), QUERY_GROUP)
    }

    pub fn clear_all(&self) {
        self.cache.flush(Some(QUERY_GROUP));
    }
}

fn run_posts(repo: &dyn ContentRepo, query: &PostQuery) -> Option<Vec<PostRecord>> {
    match repo.query_posts(query) {
        Ok(posts) => Some(posts),
        Err(err) => {
            warn!(
                op = "query_posts",
                target_module = "weft::application::query",
                error = %err,
                "Post query failed"
            );
            None
        }
    }
}
