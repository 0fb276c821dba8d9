//! Nested tree export starting from any node

use super::MindMapService;
use crate::db::Node;
use crate::error::{MindMapError, Result};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportedNode {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,          // ISO-8601
    pub children: Vec<ExportedNode>,
}

impl MindMapService {
    /// Rebuild the subtree under `node_id` by walking child edges.
    /// Children appear in the order the store returns them.
    pub fn export(&self, node_id: &str) -> Result<ExportedNode> {
        let node = self.db
            .get_node(node_id)?
            .ok_or_else(|| MindMapError::NotFound(node_id.to_string()))?;

        let mut visited = HashSet::new();
        self.build_export_tree(node, &mut visited)
    }

    fn build_export_tree(&self, node: Node, visited: &mut HashSet<String>) -> Result<ExportedNode> {
        visited.insert(node.id.clone());

        let mut children = Vec::new();
        for child in self.db.get_children(&node.id)? {
            // A node reachable twice would mean a cycle or a second parent
            if visited.contains(&child.id) {
                tracing::warn!("Skipping already exported node {} under {}", child.id, node.id);
                continue;
            }
            children.push(self.build_export_tree(child, visited)?);
        }

        Ok(ExportedNode {
            created_at: node.created_at_iso(),
            id: node.id,
            title: node.title,
            content: node.content,
            children,
        })
    }
}
