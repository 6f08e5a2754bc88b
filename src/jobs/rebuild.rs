//! Index rebuild pipeline
//!
//! Regenerates the article index from source content, one group at a
//! time. The actual enumeration of content items belongs to the group's
//! content-type extension; this pipeline resolves the extension, keys the
//! work by (content type, group id) so an in-progress rebuild is
//! independently detectable, and chains "rebuild all" strictly
//! sequentially to bound content-store load.

use crate::extension::ExtensionRegistry;
use crate::index::{IndexStore, RecordId};
use crate::jobs::TaskQueue;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Queue-driven index regeneration
pub struct RebuildPipeline {
    store: Arc<dyn IndexStore>,
    registry: Arc<ExtensionRegistry>,
    queue: Arc<TaskQueue>,
}

/// Task identity for one group's rebuild
#[must_use]
pub(crate) fn rebuild_task_id(content_type: &str, group: RecordId) -> String {
    format!("nntp_group_rebuild_{}:{}", content_type, group)
}

impl RebuildPipeline {
    /// Assemble the pipeline over its collaborators
    pub fn new(
        store: Arc<dyn IndexStore>,
        registry: Arc<ExtensionRegistry>,
        queue: Arc<TaskQueue>,
    ) -> Self {
        Self {
            store,
            registry,
            queue,
        }
    }

    /// Rebuild one group's index
    ///
    /// Returns false when a rebuild for the same group is already
    /// running. Unknown groups and unregistered content types are errors
    /// here: rebuilds are an administrative operation, not a client
    /// request.
    pub async fn rebuild_group(&self, group_id: RecordId) -> Result<bool> {
        let group = self
            .store
            .group_by_id(group_id)
            .await?
            .with_context(|| format!("group {} not found", group_id))?;

        let ext = self.registry.get(&group.content_type).with_context(|| {
            format!(
                "no extension registered for content type '{}'",
                group.content_type
            )
        })?;

        let task_id = rebuild_task_id(&group.content_type, group.id);
        let run = self
            .queue
            .run(&task_id, ext.rebuild_group(self.store.as_ref(), &group))
            .await;

        match run {
            None => {
                info!(group = %group.name, "rebuild already in progress, skipping");
                Ok(false)
            }
            Some(result) => {
                result.with_context(|| format!("rebuild of group '{}' failed", group.name))?;
                info!(group = %group.name, "group index rebuilt");
                Ok(true)
            }
        }
    }

    /// Rebuild every group, sorted by name, strictly one after another
    ///
    /// Per-group failures are logged and the chain continues; only a
    /// failure to enumerate groups aborts the run.
    pub async fn rebuild_all(&self) -> Result<()> {
        let groups = self.store.groups_sorted_by_name().await?;
        info!(count = groups.len(), "rebuilding all groups");

        for group in groups {
            if let Err(e) = self.rebuild_group(group.id).await {
                error!(group = %group.name, error = %e, "rebuild failed, continuing with next group");
            }
        }

        Ok(())
    }

    /// Whether a rebuild for this group is currently running
    pub async fn is_rebuilding(&self, group_id: RecordId) -> Result<bool> {
        let Some(group) = self.store.group_by_id(group_id).await? else {
            return Ok(false);
        };
        Ok(self
            .queue
            .is_running(&rebuild_task_id(&group.content_type, group.id)))
    }
}
