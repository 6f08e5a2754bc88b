//! Index retention job
//!
//! Periodically trims every group's article index to a bounded size and
//! age, then recomputes the low water mark. Two candidate cutoffs are
//! computed per group and the stricter (more recent) one wins:
//!
//! - count-bound: the id of the article ranked `index_max_posts`-th most
//!   recent; absent when fewer articles exist.
//! - age-bound: the id threshold for now minus `index_max_days` days.
//!
//! Everything with an id below the effective cutoff is deleted. The new
//! min_index is the oldest survivor's index, or max_index + 1 when the
//! group emptied out, so the group reports zero total without ever
//! reusing article numbers.
//!
//! One group's failure never aborts the others, and the job never
//! returns an error to its scheduler.

use crate::config::RetentionConfig;
use crate::index::{Group, IndexStore, RecordId};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// The periodic cleanup job over the whole index
pub struct RetentionJob {
    store: Arc<dyn IndexStore>,
    config: RetentionConfig,
}

impl RetentionJob {
    /// Create the job with its limits
    pub fn new(store: Arc<dyn IndexStore>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// One full pass over all groups; errors are logged, never returned
    pub async fn run(&self) {
        let groups = match self.store.groups_sorted_by_name().await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "group cleanup: failed to enumerate groups");
                return;
            }
        };

        for group in groups {
            if let Err(e) = self.trim_group(&group).await {
                error!(group = %group.name, error = %e, "group cleanup failed");
            }
        }
    }

    /// Compute the effective cutoff for one group
    pub async fn cutoff(&self, group: &Group) -> Result<RecordId> {
        let count_bound = self
            .store
            .nth_most_recent(group.id, self.config.index_max_posts)
            .await?
            .map_or(RecordId::ZERO, |a| a.id);

        let age_bound =
            RecordId::from_timestamp(Utc::now() - Duration::days(self.config.index_max_days));

        Ok(count_bound.max(age_bound))
    }

    async fn trim_group(&self, group: &Group) -> Result<()> {
        let cutoff = self.cutoff(group).await?;
        if cutoff == RecordId::ZERO {
            return Ok(());
        }

        let removed = self.store.delete_articles_before(group.id, cutoff).await?;

        let min_index = match self.store.oldest_article(group.id).await? {
            Some(oldest) => oldest.index,
            None => group.max_index + 1,
        };

        if min_index != group.min_index {
            self.store.set_group_min_index(group.id, min_index).await?;
        }

        if removed > 0 {
            info!(
                group = %group.name,
                removed,
                min_index,
                "trimmed group index"
            );
        } else {
            debug!(group = %group.name, "group index already within limits");
        }

        Ok(())
    }
}

/// Spawn the retention loop on its configured schedule
///
/// The first tick fires after one full interval, not at startup; a
/// freshly started gateway should serve traffic before it starts
/// trimming.
pub fn spawn_retention(job: RetentionJob) -> tokio::task::JoinHandle<()> {
    let period = job.config.schedule;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            job.run().await;
        }
    })
}
