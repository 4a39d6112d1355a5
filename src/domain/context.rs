//! Per-request ambient state.
//!
//! Request sources, the current entities and the viewer are passed
//! explicitly instead of being read from process globals.

use std::collections::BTreeMap;

/// Who is looking at the rendered output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Option<u64>,
    /// Allowed to manage site options; unlocks diagnostics.
    pub can_manage: bool,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            can_manage: false,
        }
    }

    pub fn manager(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            can_manage: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub query: BTreeMap<String, String>,
    pub body: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// `None` when no session was started.
    pub session: Option<BTreeMap<String, String>>,
    pub server: BTreeMap<String, String>,
    /// Path and query of the current request, e.g. `/blog/?page=2`.
    pub request_uri: String,
    pub current_post: Option<u64>,
    pub queried_term: Option<u64>,
    pub viewer: Viewer,
    /// Rendering inside the administration screens.
    pub admin_screen: bool,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Body wins over query for the merged request view.
    pub fn request_value(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .or_else(|| self.query.get(key))
            .map(String::as_str)
    }

    pub fn session_value(&self, key: &str) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.get(key))
            .map(String::as_str)
    }

    pub fn is_logged_in(&self) -> bool {
        self.viewer.user_id.is_some()
    }

    pub fn is_privileged(&self) -> bool {
        self.viewer.can_manage
    }

    /// Same request with a different current post, for loop items.
    pub fn with_current_post(&self, post_id: u64) -> Self {
        Self {
            current_post: Some(post_id),
            ..self.clone()
        }
    }
}
