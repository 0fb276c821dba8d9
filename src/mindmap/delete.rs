//! Subtree removal

use super::MindMapService;
use crate::error::{MindMapError, Result};
use crate::utils::short_id;
use std::collections::{HashSet, VecDeque};

impl MindMapService {
    /// Delete `node_id` and everything reachable through child edges in a
    /// single store transaction. Returns the number of nodes removed.
    ///
    /// Root protection is the caller's job; this will happily drop the
    /// whole graph if asked to.
    pub fn delete_subtree(&self, node_id: &str) -> Result<usize> {
        if self.db.get_node(node_id)?.is_none() {
            return Err(MindMapError::NotFound(node_id.to_string()));
        }

        let ids = self.descendant_closure(node_id)?;
        let deleted = self.db.delete_nodes_by_ids(&ids)?;

        tracing::info!("Deleted subtree {}: {} nodes", short_id(node_id), deleted);
        Ok(deleted)
    }

    /// `node_id` followed by all of its descendants, breadth first
    fn descendant_closure(&self, node_id: &str) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue = VecDeque::from([node_id.to_string()]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            for child in self.db.get_child_ids(&id)? {
                if !visited.contains(&child) {
                    queue.push_back(child);
                }
            }
            ordered.push(id);
        }

        Ok(ordered)
    }
}
