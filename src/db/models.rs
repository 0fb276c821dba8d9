use serde::{Deserialize, Serialize};

// The graph is a forest of mind maps hanging off one ObjectRoot node.
// Parent/child structure lives only in the edges table; nodes carry no
// parent pointer.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,             // epoch millis, immutable
    #[serde(rename = "isRoot")]
    pub is_root: bool,               // true = ObjectRoot (exactly one)

    // Empty = no fingerprint available. Never sent over the wire (too large).
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Node {
    /// Creation time in RFC 3339 / ISO-8601 form.
    pub fn created_at_iso(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.created_at)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }
}

/// Directed parent -> child relation: `target` is a child of `source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}
