//! Scripted collaborators for engine tests

use super::MindMapService;
use crate::ai_client::{Embedder, MindMapDraft, TextGenerator};
use crate::db::{Database, Node};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub enum FakeGenerator {
    Single(MindMapDraft),
    ByKeyword(HashMap<String, MindMapDraft>),
    Failing,
}

impl FakeGenerator {
    pub fn single(draft: MindMapDraft) -> Self {
        FakeGenerator::Single(draft)
    }

    pub fn by_keyword(drafts: Vec<(&str, MindMapDraft)>) -> Self {
        FakeGenerator::ByKeyword(drafts.into_iter().map(|(k, d)| (k.to_string(), d)).collect())
    }

    pub fn failing() -> Self {
        FakeGenerator::Failing
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_mindmap(&self, keyword: &str) -> Result<MindMapDraft, String> {
        match self {
            FakeGenerator::Single(draft) => Ok(draft.clone()),
            FakeGenerator::ByKeyword(map) => map
                .get(keyword)
                .cloned()
                .ok_or_else(|| format!("no draft for '{}'", keyword)),
            FakeGenerator::Failing => Err("generator unavailable".to_string()),
        }
    }
}

/// Looks fingerprints up by text; unknown text gets an empty vector,
/// texts listed in `failing` return an error.
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn empty() -> Self {
        Self::with(vec![])
    }

    pub fn with(vectors: Vec<(&str, Vec<f32>)>) -> Self {
        Self {
            vectors: vectors.into_iter().map(|(t, v)| (t.to_string(), v)).collect(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, texts: &[&str]) -> Self {
        self.failing.extend(texts.iter().map(|t| t.to_string()));
        self
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(text) {
            return Err(format!("embedding backend down for '{}'", text));
        }
        Ok(self.vectors.get(text).cloned().unwrap_or_default())
    }
}

pub fn service_with<G, E>(generator: G, embedder: E) -> MindMapService
where
    G: TextGenerator + 'static,
    E: Embedder + 'static,
{
    let db = Arc::new(Database::in_memory().unwrap());
    MindMapService::new(db, Arc::new(generator), Arc::new(embedder))
}

pub fn titles(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(|n| n.title.clone()).collect()
}

pub fn sorted_titles(nodes: &[Node]) -> Vec<String> {
    let mut t = titles(nodes);
    t.sort();
    t
}
