//! Draft -> graph materialization
//!
//! Each draft entry becomes one node plus one edge from its parent. Sibling
//! subtrees run as separate tokio tasks; every task hands back the nodes it
//! created and the parent merges them at the join point, so the batch is
//! complete (and owned by the caller) once `insert` returns.

use super::MindMapService;
use crate::ai_client::{Embedder, MindMapDraft};
use crate::db::{Database, Node};
use crate::error::Result;
use crate::utils::short_id;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::task::JoinSet;

impl MindMapService {
    /// Insert `draft` under `parent_id`, returning every node created.
    ///
    /// Untitled entries are skipped together with their whole subtree.
    /// A failed embedding degrades to an empty fingerprint; a store failure
    /// aborts the outstanding siblings and propagates.
    pub async fn insert(&self, draft: MindMapDraft, parent_id: String) -> Result<Vec<Node>> {
        insert_subtree(self.db.clone(), self.embedder.clone(), draft, parent_id).await
    }
}

fn insert_subtree(
    db: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    draft: MindMapDraft,
    parent_id: String,
) -> BoxFuture<'static, Result<Vec<Node>>> {
    async move {
        let Some(title) = draft.title().map(str::to_string) else {
            return Ok(Vec::new());
        };

        let content = title.clone();
        let embedding = match embedder.embed(&content).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Embedding failed for '{}', storing without fingerprint: {}", title, e);
                Vec::new()
            }
        };

        let node = db.create_child_node(&parent_id, &title, Some(&content), &embedding)?;
        tracing::debug!("Created node {} '{}' under {}", short_id(&node.id), title, short_id(&parent_id));

        let node_id = node.id.clone();
        let mut created = vec![node];

        let mut tasks = JoinSet::new();
        for child in draft.children {
            tasks.spawn(insert_subtree(db.clone(), embedder.clone(), child, node_id.clone()));
        }

        // Dropping the set on an early return aborts the remaining siblings
        while let Some(joined) = tasks.join_next().await {
            created.extend(joined??);
        }

        Ok(created)
    }
    .boxed()
}
