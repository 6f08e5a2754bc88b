//! Shared test fixture: an in-memory forum content type
//!
//! Models the platform side of one content type: posts with authors,
//! titles and creation times, per-group visibility rules, and a rebuild
//! that enumerates posts in creation order.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nntp_gateway::adapter::{Adapter, Session};
use nntp_gateway::extension::{ArticleData, ContentExtension, ExtensionRegistry};
use nntp_gateway::identity::MemoryIdentityProvider;
use nntp_gateway::index::{Article, Group, IndexStore, MemoryStore, RecordId};
use nntp_gateway::jobs::{RebuildPipeline, TaskQueue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const HOSTNAME: &str = "news.example.com";
pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Debug, Clone)]
pub struct Post {
    pub source: RecordId,
    pub parent: Option<RecordId>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub created: DateTime<Utc>,
    pub body: String,
}

#[derive(Default)]
struct ForumState {
    /// Post bodies by source id
    posts: HashMap<RecordId, Post>,
    /// Post ordering per group source, creation order
    order: HashMap<RecordId, Vec<RecordId>>,
    /// Group sources visible to authenticated sessions only
    restricted: HashSet<RecordId>,
}

/// Fake platform content for the "forum" content type
#[derive(Default)]
pub struct ForumContent {
    state: RwLock<ForumState>,
}

impl ForumContent {
    pub async fn add_post(
        &self,
        group_source: RecordId,
        author: Option<&str>,
        title: Option<&str>,
        parent: Option<RecordId>,
        age_days: i64,
        body: &str,
    ) -> RecordId {
        let created = Utc::now() - Duration::days(age_days);
        let post = Post {
            source: RecordId::generate_at(created),
            parent,
            author: author.map(str::to_string),
            title: title.map(str::to_string),
            created,
            body: body.to_string(),
        };
        let source = post.source;

        let mut state = self.state.write().await;
        state.order.entry(group_source).or_default().push(source);
        state.posts.insert(source, post);
        source
    }

    pub async fn restrict(&self, group_source: RecordId) {
        self.state.write().await.restricted.insert(group_source);
    }

    /// Delete a post on the platform side, as a moderator would
    pub async fn remove_post(&self, source: RecordId) {
        let mut state = self.state.write().await;
        state.posts.remove(&source);
        for order in state.order.values_mut() {
            order.retain(|s| *s != source);
        }
    }
}

#[async_trait]
impl ContentExtension for ForumContent {
    async fn filter_access(&self, session: &Session, groups: &[Group]) -> Result<Vec<bool>> {
        let state = self.state.read().await;
        Ok(groups
            .iter()
            .map(|g| !state.restricted.contains(&g.source) || session.is_authenticated())
            .collect())
    }

    async fn render_articles(
        &self,
        group: &Group,
        articles: &[Article],
        locale: &str,
    ) -> Result<Vec<Option<ArticleData>>> {
        let state = self.state.read().await;
        Ok(articles
            .iter()
            .map(|article| {
                state.posts.get(&article.source).map(|post| ArticleData {
                    source: article.source,
                    index: article.index,
                    group_name: group.name.clone(),
                    from: post.author.clone(),
                    subject: post.title.clone(),
                    date: post.created,
                    reply_to: post.parent,
                    html: format!("<div lang=\"{}\">{}</div>", locale, post.body),
                })
            })
            .collect())
    }

    async fn rebuild_group(&self, store: &dyn IndexStore, group: &Group) -> Result<()> {
        let state = self.state.read().await;
        let Some(order) = state.order.get(&group.source) else {
            return Ok(());
        };

        let mut max_index = group.max_index;
        let mut last_index = group.last_index;

        for source in order {
            let Some(post) = state.posts.get(source) else {
                continue;
            };
            let candidate = Article {
                id: RecordId::generate_at(post.created),
                source: *source,
                parent: post.parent,
                group: group.id,
                index: last_index + 1,
            };
            let stored = store.upsert_article(candidate).await?;
            if stored.index > last_index {
                last_index = stored.index;
                max_index = stored.index;
            }
        }

        store
            .set_group_counters(group.id, max_index, last_index)
            .await?;
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ExtensionRegistry>,
    pub identity: Arc<MemoryIdentityProvider>,
    pub forum: Arc<ForumContent>,
    pub adapter: Arc<Adapter>,
    pub rebuild: RebuildPipeline,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let forum = Arc::new(ForumContent::default());
        let mut registry = ExtensionRegistry::new();
        registry.register("forum", forum.clone());
        let registry = Arc::new(registry);
        let identity = Arc::new(MemoryIdentityProvider::new());

        let adapter = Arc::new(Adapter::new(
            store.clone() as Arc<dyn IndexStore>,
            registry.clone(),
            identity.clone(),
            HOSTNAME,
            DEFAULT_LOCALE,
        ));

        let rebuild = RebuildPipeline::new(
            store.clone() as Arc<dyn IndexStore>,
            registry.clone(),
            Arc::new(TaskQueue::new()),
        );

        Self {
            store,
            registry,
            identity,
            forum,
            adapter,
            rebuild,
        }
    }

    /// Create a group row for a fresh content section
    pub async fn add_group(&self, name: &str) -> Group {
        let group = Group::new(name, RecordId::generate(), "forum");
        self.store.insert_group(group.clone()).await.unwrap();
        group
    }

    /// Shorthand: seed `count` posts aged newest-last and rebuild
    pub async fn seed_group(&self, name: &str, count: usize) -> Group {
        let group = self.add_group(name).await;
        for i in 0..count {
            self.forum
                .add_post(
                    group.source,
                    Some("alice"),
                    Some(&format!("Post {}", i + 1)),
                    None,
                    (count - i) as i64,
                    &format!("body of post {}", i + 1),
                )
                .await;
        }
        self.rebuild.rebuild_group(group.id).await.unwrap();
        self.store.group_by_id(group.id).await.unwrap().unwrap()
    }
}
