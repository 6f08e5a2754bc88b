//! Access filter dispatcher
//!
//! Visibility checks are content-type specific, so the dispatcher
//! partitions its input by content type and hands each partition to the
//! registered extension in one call. A type with no registered extension
//! denies by default. Per-group results are OR-ed across every extension
//! that evaluated the group; with one content type per group that is a
//! single term today, but the union-of-grants rule is kept uniform so
//! multi-tagged groups would compose correctly.

use crate::adapter::Session;
use crate::extension::ExtensionRegistry;
use crate::index::Group;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatches visibility checks to content-type extensions
#[derive(Debug, Clone)]
pub struct AccessFilter {
    registry: Arc<ExtensionRegistry>,
}

impl AccessFilter {
    /// Create a dispatcher over the given registry
    #[must_use]
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }

    /// Visibility of each group for this session, parallel to the input
    pub async fn filter(&self, session: &Session, groups: &[Group]) -> Result<Vec<bool>> {
        let mut result = vec![false; groups.len()];

        // Partition positions by content type; each registered extension
        // is invoked exactly once regardless of how many groups share its
        // type.
        let mut partitions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            partitions
                .entry(group.content_type.as_str())
                .or_default()
                .push(idx);
        }

        for (content_type, positions) in partitions {
            let Some(ext) = self.registry.get(content_type) else {
                continue;
            };

            let subset: Vec<Group> = positions.iter().map(|&i| groups[i].clone()).collect();
            let grants = ext.filter_access(session, &subset).await?;

            for (&pos, granted) in positions.iter().zip(grants) {
                result[pos] = result[pos] || granted;
            }
        }

        Ok(result)
    }

    /// Single-group form of [`filter`](Self::filter)
    pub async fn allows(&self, session: &Session, group: &Group) -> Result<bool> {
        let result = self.filter(session, std::slice::from_ref(group)).await?;
        Ok(result.first().copied().unwrap_or(false))
    }
}
