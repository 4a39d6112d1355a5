//! Collaborator traits describing the host site.
//!
//! Persistence, the page-builder engine and the oEmbed provider stay outside
//! this crate; renderers only see these narrow seams.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::{PostRecord, TermRecord, UserRecord};
use crate::domain::error::RenderError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchColumn {
    Title,
    Excerpt,
    Content,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermMatchField {
    TermId,
    Name,
    #[default]
    Slug,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxOperator {
    #[default]
    In,
    NotIn,
    And,
    Exists,
    NotExists,
}

/// One taxonomy constraint of a content query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxClause {
    pub taxonomy: String,
    pub field: TermMatchField,
    pub terms: Vec<String>,
    pub operator: TaxOperator,
}

/// One meta constraint of a content query. `compare` and `value_type` are
/// upper-cased (`=`, `LIKE`, `IN`, `EXISTS`, `NUMERIC`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaClause {
    pub key: String,
    pub value: Option<Value>,
    pub compare: String,
    pub value_type: Option<String>,
}

/// Arguments of a post listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostQuery {
    pub post_types: Vec<String>,
    pub statuses: Vec<String>,
    pub per_page: usize,
    pub paged: usize,
    pub offset: usize,
    pub order_by: String,
    pub order: SortOrder,
    pub author: Option<u64>,
    pub search: Option<String>,
    pub search_columns: Vec<SearchColumn>,
    pub meta_query: Vec<MetaClause>,
    pub tax_query: Vec<TaxClause>,
    pub exclude: Vec<u64>,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            post_types: vec!["post".to_string()],
            statuses: vec!["publish".to_string()],
            per_page: 10,
            paged: 1,
            offset: 0,
            order_by: "date".to_string(),
            order: SortOrder::Desc,
            author: None,
            search: None,
            search_columns: vec![
                SearchColumn::Title,
                SearchColumn::Excerpt,
                SearchColumn::Content,
            ],
            meta_query: Vec::new(),
            tax_query: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

pub trait ContentRepo: Send + Sync {
    fn post(&self, id: u64) -> Result<Option<PostRecord>, RepoError>;
    fn term(&self, id: u64) -> Result<Option<TermRecord>, RepoError>;
    fn user(&self, id: u64) -> Result<Option<UserRecord>, RepoError>;
    fn attachment_url(&self, id: u64) -> Result<Option<String>, RepoError>;
    fn permalink(&self, post_id: u64) -> Result<Option<String>, RepoError>;
    fn term_link(&self, term_id: u64) -> Result<Option<String>, RepoError>;
    fn query_posts(&self, query: &PostQuery) -> Result<Vec<PostRecord>, RepoError>;
}

pub trait OptionsRepo: Send + Sync {
    fn option(&self, name: &str) -> Result<Option<Value>, RepoError>;
}

pub trait ConstantsRepo: Send + Sync {
    fn constant(&self, name: &str) -> Option<Value>;
}

/// Expands embedded shortcodes on behalf of an external engine.
pub trait ShortcodeExpander {
    fn expand(&self, text: &str) -> String;
}

/// External page-builder engine.
pub trait TemplateEngine: Send + Sync {
    fn is_active(&self) -> bool;
    /// Render template `id`; widgets may call back into `shortcodes`.
    fn render(&self, id: u64, shortcodes: &dyn ShortcodeExpander) -> Result<String, RenderError>;
}

/// oEmbed provider.
pub trait Embedder: Send + Sync {
    fn oembed(&self, url: &str) -> Option<String>;
}

/// Every collaborator the engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentRepo>,
    pub options: Arc<dyn OptionsRepo>,
    pub constants: Arc<dyn ConstantsRepo>,
    pub templates: Arc<dyn TemplateEngine>,
    pub embeds: Arc<dyn Embedder>,
}

impl Collaborators {
    /// Use one object for every seam, as the fixture site does.
    pub fn from_site<S>(site: Arc<S>) -> Self
    where
        S: ContentRepo + OptionsRepo + ConstantsRepo + TemplateEngine + Embedder + 'static,
    {
        Self {
            content: site.clone(),
            options: site.clone(),
            constants: site.clone(),
            templates: site.clone(),
            embeds: site,
        }
    }
}
