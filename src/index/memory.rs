//! In-memory index store
//!
//! Reference implementation of [`IndexStore`] backed by ordered maps.
//! Used by the test suites and by standalone runs without a platform
//! database. The BTreeMap keyed by row id gives the same creation-ordered
//! scans a persistent store provides through its id index.

use super::{Article, Group, IndexStore, RecordId};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    groups: HashMap<RecordId, Group>,
    group_names: HashMap<String, RecordId>,
    /// Articles by row id; iteration order is creation order
    articles: BTreeMap<RecordId, Article>,
    by_source: HashMap<RecordId, RecordId>,
    /// (group, index) -> article id
    by_number: BTreeMap<(RecordId, u64), RecordId>,
}

/// In-memory [`IndexStore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn insert_group(&self, group: Group) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.group_names.contains_key(&group.name) {
            anyhow::bail!("group name '{}' already exists", group.name);
        }
        inner.group_names.insert(group.name.clone(), group.id);
        inner.groups.insert(group.id, group);
        Ok(())
    }

    async fn group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner
            .group_names
            .get(name)
            .and_then(|id| inner.groups.get(id))
            .cloned())
    }

    async fn group_by_id(&self, id: RecordId) -> Result<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.get(&id).cloned())
    }

    async fn group_by_source(&self, source: RecordId) -> Result<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.values().find(|g| g.source == source).cloned())
    }

    async fn groups_sorted_by_name(&self) -> Result<Vec<Group>> {
        let inner = self.inner.read().await;
        let mut groups: Vec<Group> = inner.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn set_group_min_index(&self, id: RecordId, min_index: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("group {} not found", id))?;
        group.min_index = min_index;
        Ok(())
    }

    async fn set_group_counters(
        &self,
        id: RecordId,
        max_index: u64,
        last_index: u64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("group {} not found", id))?;
        group.max_index = max_index;
        group.last_index = last_index;
        Ok(())
    }

    async fn delete_group(&self, id: RecordId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(group) = inner.groups.remove(&id) {
            inner.group_names.remove(&group.name);
        }
        Ok(())
    }

    async fn upsert_article(&self, article: Article) -> Result<Article> {
        let mut inner = self.inner.write().await;

        if let Some(existing_id) = inner.by_source.get(&article.source) {
            let existing = inner.articles.get(existing_id).cloned();
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }

        if inner
            .by_number
            .contains_key(&(article.group, article.index))
        {
            anyhow::bail!(
                "article index {} already assigned in group {}",
                article.index,
                article.group
            );
        }

        inner.by_source.insert(article.source, article.id);
        inner
            .by_number
            .insert((article.group, article.index), article.id);
        inner.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn article_by_source(&self, source: RecordId) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_source
            .get(&source)
            .and_then(|id| inner.articles.get(id))
            .cloned())
    }

    async fn article_by_number(&self, group: RecordId, index: u64) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_number
            .get(&(group, index))
            .and_then(|id| inner.articles.get(id))
            .cloned())
    }

    async fn articles_in_range(
        &self,
        group: RecordId,
        from: u64,
        to: u64,
    ) -> Result<Vec<Article>> {
        if from > to {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        Ok(inner
            .by_number
            .range((group, from)..=(group, to))
            .filter_map(|(_, id)| inner.articles.get(id))
            .cloned()
            .collect())
    }

    async fn articles_since(
        &self,
        groups: &[RecordId],
        threshold: RecordId,
    ) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .range(threshold..)
            .map(|(_, a)| a)
            .filter(|a| groups.contains(&a.group))
            .cloned()
            .collect())
    }

    async fn nth_most_recent(&self, group: RecordId, n: u64) -> Result<Option<Article>> {
        if n == 0 {
            return Ok(None);
        }
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .values()
            .rev()
            .filter(|a| a.group == group)
            .nth(n as usize - 1)
            .cloned())
    }

    async fn oldest_article(&self, group: RecordId) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_number
            .range((group, 0)..=(group, u64::MAX))
            .next()
            .and_then(|(_, id)| inner.articles.get(id))
            .cloned())
    }

    async fn delete_articles_before(&self, group: RecordId, cutoff: RecordId) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<RecordId> = inner
            .articles
            .range(..cutoff)
            .filter(|(_, a)| a.group == group)
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            if let Some(article) = inner.articles.remove(id) {
                inner.by_source.remove(&article.source);
                inner.by_number.remove(&(article.group, article.index));
            }
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_articles_in_group(&self, group: RecordId) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<RecordId> = inner
            .articles
            .values()
            .filter(|a| a.group == group)
            .map(|a| a.id)
            .collect();

        for id in &doomed {
            if let Some(article) = inner.articles.remove(id) {
                inner.by_source.remove(&article.source);
                inner.by_number.remove(&(article.group, article.index));
            }
        }
        Ok(doomed.len() as u64)
    }

    async fn count_articles(&self, group: RecordId) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.articles.values().filter(|a| a.group == group).count() as u64)
    }
}
