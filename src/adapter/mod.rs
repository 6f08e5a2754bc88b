//! Protocol adapter
//!
//! The contracts an NNTP engine needs to serve read commands, translated
//! into index-store operations: group selection and listing, article
//! resolution by message-id or sequence number, range and "new since"
//! scans, authentication, and header/body synthesis.
//!
//! Not-found and access-denied are normal negative results everywhere in
//! this module (false/None/empty), never errors. Store and render
//! failures propagate as errors for the engine to log with command
//! context and answer with a generic failure.

mod body;
mod headers;
mod session;
mod wildmat;

pub use session::{GroupView, Session};
pub use wildmat::Wildmat;

use crate::access::AccessFilter;
use crate::extension::{ArticleData, ExtensionRegistry};
use crate::identity::IdentityProvider;
use crate::index::{Article, Group, IndexStore, RecordId};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// How a client referred to an article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Designator {
    /// Global message-id carrying the source content item id
    MessageId(RecordId),
    /// Group-local sequence number, relative to the selected group
    Number(u64),
}

impl Designator {
    /// Parse an ARTICLE/HEAD/BODY/STAT argument
    ///
    /// A message-id is `<24-hex@anything>`; the hostname part is not
    /// checked since ids synthesized by older hostnames must stay
    /// resolvable. Anything purely numeric is a sequence number.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        if let Some(inner) = input.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            let (source, _host) = inner.split_once('@')?;
            return RecordId::parse(source).map(Self::MessageId);
        }

        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            return input.parse().ok().map(Self::Number);
        }

        None
    }
}

/// The gateway's protocol adapter
pub struct Adapter {
    store: Arc<dyn IndexStore>,
    registry: Arc<ExtensionRegistry>,
    access: AccessFilter,
    identity: Arc<dyn IdentityProvider>,
    hostname: String,
    default_locale: String,
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("hostname", &self.hostname)
            .field("default_locale", &self.default_locale)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Adapter {
    /// Assemble an adapter over its collaborators
    pub fn new(
        store: Arc<dyn IndexStore>,
        registry: Arc<ExtensionRegistry>,
        identity: Arc<dyn IdentityProvider>,
        hostname: impl Into<String>,
        default_locale: impl Into<String>,
    ) -> Self {
        let access = AccessFilter::new(Arc::clone(&registry));
        Self {
            store,
            registry,
            access,
            identity,
            hostname: hostname.into(),
            default_locale: default_locale.into(),
        }
    }

    /// The hostname used in message-id synthesis
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Select a group by name, storing its view on the session
    ///
    /// Returns false when the group does not exist or the session may not
    /// see it; the session's previous selection is left untouched.
    pub async fn select_group(&self, session: &mut Session, name: &str) -> Result<bool> {
        let Some(group) = self.store.group_by_name(name).await? else {
            return Ok(false);
        };

        if !self.access.allows(session, &group).await? {
            return Ok(false);
        }

        session.select_group(GroupView::from_group(&group));
        Ok(true)
    }

    /// List groups sorted by name, optionally created since a time and
    /// filtered by a wildmat pattern, each passed through the access filter
    pub async fn list_groups(
        &self,
        session: &Session,
        since: Option<DateTime<Utc>>,
        pattern: Option<&Wildmat>,
    ) -> Result<Vec<Group>> {
        let mut groups = self.store.groups_sorted_by_name().await?;

        if let Some(since) = since {
            let threshold = RecordId::from_timestamp(since);
            groups.retain(|g| g.id >= threshold);
        }

        if let Some(pattern) = pattern {
            groups.retain(|g| pattern.matches(&g.name));
        }

        let visible = self.access.filter(session, &groups).await?;
        let groups = groups
            .into_iter()
            .zip(visible)
            .filter_map(|(g, ok)| ok.then_some(g))
            .collect();

        Ok(groups)
    }

    /// Resolve and render one article
    ///
    /// Message-id lookups re-derive the owning group and re-check access
    /// against it, same as every other resolution path. Returns None for
    /// absent, denied or unrenderable articles.
    pub async fn get_article(
        &self,
        session: &Session,
        designator: Designator,
    ) -> Result<Option<ArticleData>> {
        let (article, group) = match designator {
            Designator::MessageId(source) => {
                let Some(article) = self.store.article_by_source(source).await? else {
                    return Ok(None);
                };
                let Some(group) = self.store.group_by_id(article.group).await? else {
                    return Ok(None);
                };
                (article, group)
            }
            Designator::Number(index) => {
                let Some(view) = session.group() else {
                    return Ok(None);
                };
                let Some(article) = self.store.article_by_number(view.id, index).await? else {
                    return Ok(None);
                };
                let Some(group) = self.store.group_by_id(article.group).await? else {
                    return Ok(None);
                };
                (article, group)
            }
        };

        if !self.access.allows(session, &group).await? {
            return Ok(None);
        }

        let rendered = self.render(session, &group, &[article]).await?;
        Ok(rendered.into_iter().flatten().next())
    }

    /// Render every existing article in an inclusive index range of the
    /// selected group; missing indices are silently omitted
    pub async fn get_range(
        &self,
        session: &Session,
        from: u64,
        to: u64,
    ) -> Result<Vec<ArticleData>> {
        let Some(view) = session.group() else {
            return Ok(Vec::new());
        };

        let Some(group) = self.store.group_by_id(view.id).await? else {
            return Ok(Vec::new());
        };

        if !self.access.allows(session, &group).await? {
            return Ok(Vec::new());
        }

        let articles = self.store.articles_in_range(group.id, from, to).await?;
        let rendered = self.render(session, &group, &articles).await?;
        Ok(rendered.into_iter().flatten().collect())
    }

    /// Articles created since a time across all matching, visible groups
    pub async fn get_new_articles(
        &self,
        session: &Session,
        since: DateTime<Utc>,
        pattern: Option<&Wildmat>,
    ) -> Result<Vec<Article>> {
        let mut groups = self.store.groups_sorted_by_name().await?;

        if let Some(pattern) = pattern {
            groups.retain(|g| pattern.matches(&g.name));
        }
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let visible = self.access.filter(session, &groups).await?;
        let group_ids: Vec<RecordId> = groups
            .iter()
            .zip(&visible)
            .filter_map(|(g, &ok)| ok.then_some(g.id))
            .collect();
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = RecordId::from_timestamp(since);
        self.store.articles_since(&group_ids, threshold).await
    }

    /// Verify the staged credential pair and bind the identity on success
    ///
    /// The staged pair is consumed before anything else happens, so a
    /// failed attempt cannot be retried without re-submitting both
    /// halves.
    pub async fn authenticate(&self, session: &mut Session) -> Result<bool> {
        let (user, pass) = session.take_credentials();

        let (Some(user), Some(pass)) = (user, pass) else {
            return Ok(false);
        };

        let Some(account) = self.identity.find_user(&user).await? else {
            debug!(user = %user, "authentication failed: unknown user");
            return Ok(false);
        };

        if !self.identity.verify_plain(account, &pass).await? {
            debug!(user = %user, "authentication failed: bad credentials");
            return Ok(false);
        }

        let info = self.identity.user_info(account).await?;
        session.bind_identity(info);
        Ok(true)
    }

    /// Synthesize the header block for a rendered article
    #[must_use]
    pub fn build_headers(&self, article: &ArticleData) -> Vec<String> {
        headers::build_headers(&self.hostname, article)
    }

    /// Synthesize the body payload for a rendered article
    #[must_use]
    pub fn build_body(&self, article: &ArticleData) -> Vec<u8> {
        body::build_body(&article.html)
    }

    async fn render(
        &self,
        session: &Session,
        group: &Group,
        articles: &[Article],
    ) -> Result<Vec<Option<ArticleData>>> {
        let Some(ext) = self.registry.get(&group.content_type) else {
            debug!(
                group = %group.name,
                content_type = %group.content_type,
                "no renderer registered"
            );
            return Ok(vec![None; articles.len()]);
        };

        let locale = session.locale().unwrap_or(&self.default_locale);
        ext.render_articles(group, articles, locale).await
    }
}
