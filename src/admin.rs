//! Administrative triggers
//!
//! The thin operations the platform's admin surface calls into: kicking
//! off rebuilds, removing a group together with its articles, and listing
//! groups with their rebuild state. Unlike the protocol adapter, a
//! missing group is an error here; an operator asked for something that
//! does not exist.

use crate::index::{Group, IndexStore, RecordId};
use crate::jobs::RebuildPipeline;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// One row of the admin group listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    /// The group row
    pub group: Group,
    /// Whether a rebuild for it is currently running
    pub rebuild_running: bool,
}

/// Entry points for the administrative surface
pub struct AdminApi {
    store: Arc<dyn IndexStore>,
    rebuild: Arc<RebuildPipeline>,
}

impl AdminApi {
    /// Assemble the admin API over its collaborators
    pub fn new(store: Arc<dyn IndexStore>, rebuild: Arc<RebuildPipeline>) -> Self {
        Self { store, rebuild }
    }

    /// Start one group's rebuild; false if one is already running
    pub async fn rebuild_group(&self, group_id: RecordId) -> Result<bool> {
        self.rebuild.rebuild_group(group_id).await
    }

    /// Rebuild every group, chained sequentially
    pub async fn rebuild_all(&self) -> Result<()> {
        self.rebuild.rebuild_all().await
    }

    /// Delete a group and all of its indexed articles
    pub async fn remove_group(&self, group_id: RecordId) -> Result<()> {
        let group = self
            .store
            .group_by_id(group_id)
            .await?
            .with_context(|| format!("group {} not found", group_id))?;

        self.store.delete_group(group.id).await?;
        let removed = self.store.delete_articles_in_group(group.id).await?;
        info!(group = %group.name, articles = removed, "group removed");
        Ok(())
    }

    /// All groups sorted by name, with their rebuild-running flags
    pub async fn list_groups(&self) -> Result<Vec<GroupStatus>> {
        let groups = self.store.groups_sorted_by_name().await?;
        let mut result = Vec::with_capacity(groups.len());

        for group in groups {
            let rebuild_running = self.rebuild.is_rebuilding(group.id).await?;
            result.push(GroupStatus {
                group,
                rebuild_running,
            });
        }

        Ok(result)
    }
}
