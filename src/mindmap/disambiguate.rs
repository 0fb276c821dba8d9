//! Near-duplicate resolution by contextual renaming
//!
//! Conflicting nodes are never merged. Both sides get their parent's title
//! appended so the two concepts stay distinguishable:
//! `"Apple"` -> `"Apple (from Fruit)"`.

use super::{MindMapService, ROOT_CONTENT, ROOT_TITLE};
use crate::db::Node;
use crate::error::Result;
use crate::similarity::is_conflict;
use crate::utils::short_id;

/// Presence of this substring means a title was already renamed
pub const DISAMBIGUATION_MARKER: &str = " (from ";

pub fn has_marker(title: &str) -> bool {
    title.contains(DISAMBIGUATION_MARKER)
}

pub fn disambiguated_title(title: &str, parent_title: &str) -> String {
    format!("{}{}{})", title, DISAMBIGUATION_MARKER, parent_title)
}

impl MindMapService {
    /// Compare each new node against every pre-existing node (root excluded)
    /// and rename both sides of the first conflict found per new node.
    /// Returns the number of titles rewritten.
    ///
    /// `new_nodes` must be the complete batch of one `add_mind_map` call.
    /// Titles are updated in place so later comparisons in the same pass
    /// see the renamed values.
    pub fn disambiguate(&self, new_nodes: &mut [Node]) -> Result<usize> {
        if new_nodes.is_empty() {
            return Ok(0);
        }

        let root = self.db.get_or_create_root(ROOT_TITLE, ROOT_CONTENT)?;
        let mut exclude: Vec<String> = new_nodes.iter().map(|n| n.id.clone()).collect();
        exclude.push(root.id);
        let mut existing = self.db.get_all_nodes_except(&exclude)?;

        let mut renamed = 0;
        for new_node in new_nodes.iter_mut() {
            if new_node.embedding.is_empty() {
                continue;
            }

            let Some(existing_node) = existing
                .iter_mut()
                .find(|e| is_conflict(&new_node.embedding, &e.embedding))
            else {
                continue;
            };

            renamed += self.rename_with_parent(existing_node)? as usize;
            renamed += self.rename_with_parent(new_node)? as usize;
        }

        Ok(renamed)
    }

    /// Append the parent's title unless the node has no parent or was
    /// already renamed. Persists first, then updates the in-memory copy.
    fn rename_with_parent(&self, node: &mut Node) -> Result<bool> {
        if has_marker(&node.title) {
            return Ok(false);
        }
        let Some(parent) = self.db.get_parent(&node.id)? else {
            return Ok(false);
        };

        let title = disambiguated_title(&node.title, &parent.title);
        self.db.update_node_title(&node.id, &title)?;
        tracing::info!("Disambiguating node {} to '{}'", short_id(&node.id), title);
        node.title = title;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ai_client::MindMapDraft;

    fn service() -> MindMapService {
        service_with(FakeGenerator::failing(), FakeEmbedder::empty())
    }

    #[test]
    fn test_title_helpers() {
        assert_eq!(disambiguated_title("Apple", "Fruit"), "Apple (from Fruit)");
        assert!(has_marker("Apple (from Fruit)"));
        assert!(!has_marker("Apple(from Fruit)"));
        assert!(!has_marker("Apple"));
    }

    #[test]
    fn test_conflict_renames_both_sides() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        let fruit = db.create_child_node(&root.id, "Fruit", None, &[0.0, 1.0]).unwrap();
        let apple = db.create_child_node(&fruit.id, "Apple", None, &[1.0, 0.0]).unwrap();

        let tech = db.create_child_node(&root.id, "Tech", None, &[0.0, -1.0]).unwrap();
        let new_apple = db.create_child_node(&tech.id, "Apple", None, &[1.0, 0.001]).unwrap();

        let mut batch = vec![tech, new_apple];
        let renamed = service.disambiguate(&mut batch).unwrap();

        assert_eq!(renamed, 2);
        assert_eq!(batch[1].title, "Apple (from Tech)");
        assert_eq!(db.get_node(&batch[1].id).unwrap().unwrap().title, "Apple (from Tech)");
        assert_eq!(db.get_node(&apple.id).unwrap().unwrap().title, "Apple (from Fruit)");
        assert_eq!(db.get_node(&fruit.id).unwrap().unwrap().title, "Fruit");
    }

    #[test]
    fn test_marker_is_idempotent() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        let a = db.create_child_node(&root.id, "A", None, &[]).unwrap();
        let old = db.create_child_node(&a.id, "Apple (from A)", None, &[1.0, 0.0]).unwrap();

        let b = db.create_child_node(&root.id, "B", None, &[]).unwrap();
        let new = db.create_child_node(&b.id, "Apple (from B)", None, &[1.0, 0.0]).unwrap();

        let mut batch = vec![b, new];
        assert_eq!(service.disambiguate(&mut batch).unwrap(), 0);
        assert_eq!(db.get_node(&old.id).unwrap().unwrap().title, "Apple (from A)");
        assert_eq!(batch[1].title, "Apple (from B)");
    }

    #[test]
    fn test_only_first_conflict_per_new_node() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        let p1 = db.create_child_node(&root.id, "P1", None, &[]).unwrap();
        let first = db.create_child_node(&p1.id, "X", None, &[1.0, 0.0]).unwrap();
        let p2 = db.create_child_node(&root.id, "P2", None, &[]).unwrap();
        let second = db.create_child_node(&p2.id, "X", None, &[1.0, 0.0]).unwrap();

        let p3 = db.create_child_node(&root.id, "P3", None, &[]).unwrap();
        let new = db.create_child_node(&p3.id, "X", None, &[1.0, 0.0]).unwrap();

        let mut batch = vec![p3, new];
        assert_eq!(service.disambiguate(&mut batch).unwrap(), 2);

        let first_title = db.get_node(&first.id).unwrap().unwrap().title;
        let second_title = db.get_node(&second.id).unwrap().unwrap().title;
        // exactly one of the existing duplicates was touched
        let touched = [first_title, second_title].iter().filter(|t| has_marker(t)).count();
        assert_eq!(touched, 1);
    }

    #[test]
    fn test_root_and_empty_fingerprints_never_conflict() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        let existing = db.create_child_node(&root.id, "Blank", None, &[]).unwrap();
        let new = db.create_child_node(&root.id, "Blank", None, &[]).unwrap();

        let mut batch = vec![new];
        assert_eq!(service.disambiguate(&mut batch).unwrap(), 0);
        assert_eq!(db.get_node(&existing.id).unwrap().unwrap().title, "Blank");
        assert_eq!(db.get_node(&root.id).unwrap().unwrap().title, ROOT_TITLE);
    }

    #[test]
    fn test_new_nodes_not_compared_with_each_other() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        let a = db.create_child_node(&root.id, "Twin", None, &[1.0]).unwrap();
        let b = db.create_child_node(&root.id, "Twin", None, &[1.0]).unwrap();

        let mut batch = vec![a, b];
        assert_eq!(service.disambiguate(&mut batch).unwrap(), 0);
        assert!(batch.iter().all(|n| n.title == "Twin"));
    }

    #[test]
    fn test_dissimilar_nodes_untouched() {
        let service = service();
        let db = service.db();
        let root = service.root().unwrap();
        db.create_child_node(&root.id, "Cat", None, &[1.0, 0.0]).unwrap();
        let dog = db.create_child_node(&root.id, "Dog", None, &[0.6, 0.8]).unwrap();

        let mut batch = vec![dog];
        assert_eq!(service.disambiguate(&mut batch).unwrap(), 0);
        assert_eq!(service.disambiguate(&mut []).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_keyword_renames_once() {
        let draft = MindMapDraft::new("Rust", vec![]);
        let embedder = FakeEmbedder::with(vec![("Rust", vec![1.0, 1.0])]);
        let service = service_with(FakeGenerator::single(draft), embedder);

        service.add_mind_map("Rust").await.unwrap();
        service.add_mind_map("Rust").await.unwrap();
        service.add_mind_map("Rust").await.unwrap();

        let names = titles(&service.db().get_all_nodes().unwrap());
        // third copy finds an already-marked twin and only renames itself
        assert_eq!(names.iter().filter(|t| *t == "Rust (from ObjectRoot)").count(), 3);
    }
}
