//! Mind map graph engine
//!
//! Grows the shared graph from generated drafts and keeps it free of
//! near-duplicate labels:
//! - `builder`: materializes a draft under a parent, sibling subtrees in parallel
//! - `disambiguate`: renames near-duplicate nodes with their parent's title
//! - `export`: nested tree reconstruction from any node
//! - `delete`: descendant closure + atomic bulk delete
//!
//! Parent, children and descendants are always store queries; nothing here
//! caches graph structure between calls.

mod builder;
mod delete;
mod disambiguate;
mod export;
#[cfg(test)]
pub(crate) mod test_support;

pub use disambiguate::{disambiguated_title, has_marker, DISAMBIGUATION_MARKER};
pub use export::ExportedNode;

use crate::ai_client::{Embedder, MindMapDraft, TextGenerator};
use crate::db::{Database, Node};
use crate::error::{MindMapError, Result};
use serde::Serialize;
use std::sync::Arc;

/// Title of the single top-level ancestor of every mind map
pub const ROOT_TITLE: &str = "ObjectRoot";
pub const ROOT_CONTENT: &str = "The single root of the entire mind map graph.";

/// Flat projection of the whole graph for force-graph style visualizers
#[derive(Debug, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub val: u32,
}

#[derive(Debug, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Clone)]
pub struct MindMapService {
    db: Arc<Database>,
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
}

impl MindMapService {
    pub fn new(db: Arc<Database>, generator: Arc<dyn TextGenerator>, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, generator, embedder }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Init-or-fetch the ObjectRoot. Not cached: the store resolves
    /// concurrent first-time initialisers.
    pub fn root(&self) -> Result<Node> {
        Ok(self.db.get_or_create_root(ROOT_TITLE, ROOT_CONTENT)?)
    }

    /// Generate a draft for `keyword`, attach it under the root, then
    /// disambiguate the new batch against the rest of the graph.
    ///
    /// Generation failure returns before any store write. Disambiguation
    /// only starts once every building task for this call has finished.
    pub async fn add_mind_map(&self, keyword: &str) -> Result<MindMapDraft> {
        let draft = self.generator
            .generate_mindmap(keyword)
            .await
            .map_err(MindMapError::Generation)?;

        let root = self.root()?;
        let mut created = self.insert(draft.clone(), root.id).await?;
        let renamed = self.disambiguate(&mut created)?;

        tracing::info!(
            "Added mind map '{}': {} nodes, {} renamed",
            keyword, created.len(), renamed
        );
        Ok(draft)
    }

    /// Flat view of every node and edge, unfiltered
    pub fn get_graph(&self) -> Result<GraphView> {
        let nodes = self.db.get_all_nodes()?;
        let edges = self.db.get_all_edges()?;

        Ok(GraphView {
            nodes: nodes.into_iter()
                .map(|n| GraphNode { id: n.id, name: n.title, val: 1 })
                .collect(),
            links: edges.into_iter()
                .map(|e| GraphLink { source: e.source, target: e.target })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_add_mind_map_scenario_a() {
        let draft = MindMapDraft::new("K", vec![
            MindMapDraft::leaf("C1"),
            MindMapDraft::new("C2", vec![MindMapDraft::leaf("GC")]),
        ]);
        let service = service_with(FakeGenerator::single(draft.clone()), FakeEmbedder::empty());

        let returned = service.add_mind_map("K").await.unwrap();
        assert_eq!(returned, draft);

        // root + 4 new nodes, exactly 4 edges
        let (nodes, edges) = service.db().get_stats().unwrap();
        assert_eq!((nodes, edges), (5, 4));

        let root = service.root().unwrap();
        let k = service.db().get_children(&root.id).unwrap();
        assert_eq!(titles(&k), vec!["K"]);
        let level1 = service.db().get_children(&k[0].id).unwrap();
        assert_eq!(sorted_titles(&level1), vec!["C1", "C2"]);
        let c2 = level1.iter().find(|n| n.title == "C2").unwrap();
        assert_eq!(titles(&service.db().get_children(&c2.id).unwrap()), vec!["GC"]);
    }

    #[tokio::test]
    async fn test_generation_failure_writes_nothing() {
        let service = service_with(FakeGenerator::failing(), FakeEmbedder::empty());

        let err = service.add_mind_map("anything").await.unwrap_err();
        assert!(matches!(err, MindMapError::Generation(_)));
        assert_eq!(service.db().get_stats().unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_duplicate_concepts_across_maps_are_renamed_scenario_b() {
        let generator = FakeGenerator::by_keyword(vec![
            ("Food", MindMapDraft::new("Food", vec![MindMapDraft::leaf("Apple")])),
            ("Company", MindMapDraft::new("Company", vec![MindMapDraft::leaf("Apple")])),
        ]);
        let embedder = FakeEmbedder::with(vec![
            ("Apple", vec![1.0, 0.0, 0.0]),
            ("Food", vec![0.0, 1.0, 0.0]),
            ("Company", vec![0.0, 0.0, 1.0]),
        ]);
        let service = service_with(generator, embedder);

        service.add_mind_map("Food").await.unwrap();
        service.add_mind_map("Company").await.unwrap();

        let all = service.db().get_all_nodes().unwrap();
        let names = titles(&all);
        assert!(names.contains(&"Apple (from Food)".to_string()));
        assert!(names.contains(&"Apple (from Company)".to_string()));
        assert!(!names.contains(&"Apple".to_string()));
        // nothing merged or removed
        assert_eq!(all.len(), 5);
        assert_eq!(service.db().get_stats().unwrap().1, 4);
    }

    #[tokio::test]
    async fn test_get_graph_projection() {
        let draft = MindMapDraft::new("K", vec![MindMapDraft::leaf("C")]);
        let service = service_with(FakeGenerator::single(draft), FakeEmbedder::empty());
        service.add_mind_map("K").await.unwrap();

        let graph = service.get_graph().unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.links.len(), 2);
        assert!(graph.nodes.iter().all(|n| n.val == 1));
        assert!(graph.nodes.iter().any(|n| n.name == ROOT_TITLE));

        let json = serde_json::to_value(&graph).unwrap();
        assert!(json["links"][0].get("source").is_some());
        assert!(json["nodes"][0].get("name").is_some());
    }

    #[tokio::test]
    async fn test_root_is_fetched_not_duplicated() {
        let service = service_with(FakeGenerator::failing(), FakeEmbedder::empty());
        let a = service.root().unwrap();
        let b = service.root().unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.title, ROOT_TITLE);
    }
}
