//! Content-type extension registry
//!
//! Each content type the platform exposes over NNTP (forums today, other
//! sources later) registers one capability object implementing
//! [`ContentExtension`]. The registry is populated once at startup and
//! looked up by content type string; an unregistered type is a defined
//! "no extension" case, which downstream code treats as deny/unrenderable.

use crate::adapter::Session;
use crate::index::{Article, Group, IndexStore, RecordId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Fully resolved article data, ready for header/body synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleData {
    /// Originating content item id
    pub source: RecordId,
    /// Group-local sequence number
    pub index: u64,
    /// Owning newsgroup name
    pub group_name: String,
    /// Author display name, absent for system-generated items
    pub from: Option<String>,
    /// Subject line, absent when the source item carries no title
    pub subject: Option<String>,
    /// Content item creation time
    pub date: DateTime<Utc>,
    /// Reply-to content item, if any
    pub reply_to: Option<RecordId>,
    /// Rendered HTML markup for the body
    pub html: String,
}

/// Per-content-type capability object
///
/// Implementations wrap the platform side of one content type: its access
/// rules, its body template, and the query that enumerates its items
/// during an index rebuild.
#[async_trait]
pub trait ContentExtension: Send + Sync {
    /// Visibility of each group for this session, parallel to the input
    ///
    /// Only groups of this extension's content type are passed in.
    async fn filter_access(&self, session: &Session, groups: &[Group]) -> Result<Vec<bool>>;

    /// Materialize article data for the given rows, parallel to the input
    ///
    /// `locale` is the requester's locale, already defaulted by the
    /// caller. Rows whose source item no longer exists come back as None.
    async fn render_articles(
        &self,
        group: &Group,
        articles: &[Article],
        locale: &str,
    ) -> Result<Vec<Option<ArticleData>>>;

    /// Regenerate the group's article index from source content
    ///
    /// Must be idempotent: running twice over unchanged content yields
    /// identical (source, index) assignments. Implementations enumerate
    /// items in creation order and upsert, advancing the group counters
    /// through the store.
    async fn rebuild_group(&self, store: &dyn IndexStore, group: &Group) -> Result<()>;
}

/// Startup-populated map from content type to its extension
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Arc<dyn ContentExtension>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.extensions.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ExtensionRegistry")
            .field("content_types", &types)
            .finish()
    }
}

impl ExtensionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension for a content type, replacing any previous one
    pub fn register(&mut self, content_type: impl Into<String>, ext: Arc<dyn ContentExtension>) {
        self.extensions.insert(content_type.into(), ext);
    }

    /// Look up the extension for a content type
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<Arc<dyn ContentExtension>> {
        self.extensions.get(content_type).cloned()
    }

    /// Whether any extension is registered for this content type
    #[must_use]
    pub fn contains(&self, content_type: &str) -> bool {
        self.extensions.contains_key(content_type)
    }
}
