//! Group/article index
//!
//! The denormalized mapping from content items to per-group article
//! sequence numbers. The index rows live in the platform's store; this
//! module defines the row types and the [`IndexStore`] trait the rest of
//! the gateway queries through, plus an in-memory implementation used by
//! tests and standalone runs.
//!
//! Row lifecycle: groups and articles are created only by the rebuild
//! pipeline, trimmed only by the retention job (and the remove-group admin
//! trigger); the protocol adapter reads and never writes.

mod id;
mod memory;

pub use id::RecordId;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

/// A newsgroup backed by one content section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Creation-ordered row id
    pub id: RecordId,
    /// Newsgroup name, unique
    pub name: String,
    /// Back-reference to the content section this group mirrors
    pub source: RecordId,
    /// Content type, selects the filter/renderer extension
    pub content_type: String,
    /// Low water mark; min_index = max_index + 1 means the group is empty
    pub min_index: u64,
    /// High water mark
    pub max_index: u64,
    /// Index assignment counter. Kept separately from max_index because
    /// the newest article can be pruned and numbering must never reuse
    /// prior values.
    pub last_index: u64,
}

impl Group {
    /// Create a new group row with empty water marks
    #[must_use]
    pub fn new(name: impl Into<String>, source: RecordId, content_type: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            source,
            content_type: content_type.into(),
            min_index: 1,
            max_index: 0,
            last_index: 0,
        }
    }

    /// Number of articles the group reports (high - low + 1, or 0 if empty)
    #[must_use]
    pub fn total(&self) -> u64 {
        (self.max_index + 1).saturating_sub(self.min_index)
    }
}

/// One indexed article: a content item pinned to a group-local sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Creation-ordered row id; "since time T" scans range over this
    pub id: RecordId,
    /// Originating content item, unique across the whole index
    pub source: RecordId,
    /// Reply-to target content item, if any
    pub parent: Option<RecordId>,
    /// Owning group
    pub group: RecordId,
    /// Group-local sequence number, assigned once, immutable
    pub index: u64,
}

/// Persistent store interface for the group/article index
///
/// Every call is a suspension point; implementations are expected to be
/// safe for concurrent readers across workers. Writers (rebuild,
/// retention) are serialized per task identity by the job queue, not here.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert a new group row
    async fn insert_group(&self, group: Group) -> Result<()>;

    /// Look up a group by its unique name
    async fn group_by_name(&self, name: &str) -> Result<Option<Group>>;

    /// Look up a group by row id
    async fn group_by_id(&self, id: RecordId) -> Result<Option<Group>>;

    /// Look up a group by its content section back-reference
    async fn group_by_source(&self, source: RecordId) -> Result<Option<Group>>;

    /// All groups, sorted by name
    async fn groups_sorted_by_name(&self) -> Result<Vec<Group>>;

    /// Advance a group's low water mark
    async fn set_group_min_index(&self, id: RecordId, min_index: u64) -> Result<()>;

    /// Advance a group's high water mark and assignment counter
    async fn set_group_counters(&self, id: RecordId, max_index: u64, last_index: u64)
        -> Result<()>;

    /// Delete a group row (articles are removed separately)
    async fn delete_group(&self, id: RecordId) -> Result<()>;

    /// Insert an article, or return the existing row for the same source
    ///
    /// The source id is the upsert key: re-running a rebuild over
    /// unchanged content must preserve existing (id, index) assignments.
    /// Returns the stored row either way.
    async fn upsert_article(&self, article: Article) -> Result<Article>;

    /// Look up an article by originating content item
    async fn article_by_source(&self, source: RecordId) -> Result<Option<Article>>;

    /// Look up an article by (group, sequence number)
    async fn article_by_number(&self, group: RecordId, index: u64) -> Result<Option<Article>>;

    /// Articles with from <= index <= to in one group, ordered by index
    async fn articles_in_range(&self, group: RecordId, from: u64, to: u64)
        -> Result<Vec<Article>>;

    /// Articles in any of the given groups with id >= threshold, ordered by id
    async fn articles_since(&self, groups: &[RecordId], threshold: RecordId)
        -> Result<Vec<Article>>;

    /// The n-th most recent article of a group (1-based), by id order
    async fn nth_most_recent(&self, group: RecordId, n: u64) -> Result<Option<Article>>;

    /// The surviving article with the smallest index in a group
    async fn oldest_article(&self, group: RecordId) -> Result<Option<Article>>;

    /// Delete every article in a group with id < cutoff, returning the count
    async fn delete_articles_before(&self, group: RecordId, cutoff: RecordId) -> Result<u64>;

    /// Delete every article in a group, returning the count
    async fn delete_articles_in_group(&self, group: RecordId) -> Result<u64>;

    /// Number of indexed articles in a group
    async fn count_articles(&self, group: RecordId) -> Result<u64>;
}
