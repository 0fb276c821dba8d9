use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use super::models::{Node, Edge};

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        let db = Database { conn: Mutex::new(conn), path: path_str };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn: Mutex::new(conn), path: ":memory:".to_string() };
        db.init()?;
        Ok(db)
    }

    /// A panic while holding the lock leaves SQLite itself consistent, so a
    /// poisoned mutex is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT,
                created_at INTEGER NOT NULL,
                embedding BLOB,          -- little-endian f32, NULL = no fingerprint
                is_root INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

            -- At most one ObjectRoot, whoever initialises first wins
            CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_single_root ON nodes(is_root) WHERE is_root = 1;

            PRAGMA foreign_keys = ON;
            "
        )?;

        Ok(())
    }

    /// Standard SELECT columns for nodes
    const NODE_COLUMNS: &'static str = "id, title, content, created_at, is_root, embedding";

    fn row_to_node(row: &rusqlite::Row) -> Result<Node> {
        let embedding: Option<Vec<u8>> = row.get(5)?;
        Ok(Node {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            is_root: row.get::<_, i32>(4)? != 0,
            embedding: embedding.map(|b| bytes_to_embedding(&b)).unwrap_or_default(),
        })
    }

    fn row_to_edge(row: &rusqlite::Row) -> Result<Edge> {
        Ok(Edge {
            id: row.get(0)?,
            source: row.get(1)?,
            target: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // ==================== Root ====================

    /// Fetch the ObjectRoot, creating it if absent.
    /// The unique index makes concurrent first-time callers converge on one row.
    pub fn get_or_create_root(&self, title: &str, content: &str) -> Result<Node> {
        let conn = self.lock();
        let now = chrono::Utc::now().timestamp_millis();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO nodes (id, title, content, created_at, embedding, is_root)
             VALUES (?1, ?2, ?3, ?4, NULL, 1)",
            params![uuid::Uuid::new_v4().to_string(), title, content, now],
        )?;
        if inserted > 0 {
            tracing::info!("Created root node '{}'", title);
        }

        conn.query_row(
            &format!("SELECT {} FROM nodes WHERE is_root = 1 LIMIT 1", Self::NODE_COLUMNS),
            [],
            Self::row_to_node,
        )
    }

    pub fn get_root(&self) -> Result<Option<Node>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM nodes WHERE is_root = 1 LIMIT 1", Self::NODE_COLUMNS),
            [],
            Self::row_to_node,
        ).optional()
    }

    // ==================== Node operations ====================

    fn new_node(title: &str, content: Option<&str>, embedding: &[f32]) -> Node {
        Node {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.map(|s| s.to_string()),
            created_at: chrono::Utc::now().timestamp_millis(),
            is_root: false,
            embedding: embedding.to_vec(),
        }
    }

    fn insert_node_row(conn: &Connection, node: &Node) -> Result<()> {
        conn.execute(
            "INSERT INTO nodes (id, title, content, created_at, embedding, is_root)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                node.id,
                node.title,
                node.content,
                node.created_at,
                embedding_to_bytes(&node.embedding),
            ],
        )?;
        Ok(())
    }

    /// Create a node and its parent edge in one transaction.
    /// A missing parent fails the whole insert, so no orphan is left behind.
    pub fn create_child_node(&self, parent_id: &str, title: &str, content: Option<&str>, embedding: &[f32]) -> Result<Node> {
        let node = Self::new_node(title, content, embedding);

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        Self::insert_node_row(&tx, &node)?;
        tx.execute(
            "INSERT INTO edges (id, source_id, target_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![uuid::Uuid::new_v4().to_string(), parent_id, node.id, node.created_at],
        )?;
        tx.commit()?;
        Ok(node)
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE id = ?1",
            Self::NODE_COLUMNS
        ))?;

        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_node(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_all_nodes(&self) -> Result<Vec<Node>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes ORDER BY created_at, rowid",
            Self::NODE_COLUMNS
        ))?;

        let nodes = stmt.query_map([], Self::row_to_node)?.collect::<Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// All nodes whose id is not in `exclude`
    pub fn get_all_nodes_except(&self, exclude: &[String]) -> Result<Vec<Node>> {
        if exclude.is_empty() {
            return self.get_all_nodes();
        }

        let placeholders: Vec<String> = (1..=exclude.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT {} FROM nodes WHERE id NOT IN ({}) ORDER BY created_at, rowid",
            Self::NODE_COLUMNS,
            placeholders.join(", ")
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params_from_iter(exclude.iter()), Self::row_to_node)?
            .collect::<Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Children via outgoing edges, in edge creation order
    pub fn get_children(&self, parent_id: &str) -> Result<Vec<Node>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT n.id, n.title, n.content, n.created_at, n.is_root, n.embedding
             FROM edges e JOIN nodes n ON n.id = e.target_id
             WHERE e.source_id = ?1
             ORDER BY e.created_at, e.rowid"
        )?;

        let nodes = stmt.query_map(params![parent_id], Self::row_to_node)?.collect::<Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Ids only, for closure walks that don't need titles or embeddings
    pub fn get_child_ids(&self, parent_id: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT target_id FROM edges WHERE source_id = ?1 ORDER BY created_at, rowid"
        )?;

        let ids = stmt.query_map(params![parent_id], |row| row.get(0))?.collect::<Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Parent via the (first) incoming edge
    pub fn get_parent(&self, node_id: &str) -> Result<Option<Node>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT n.id, n.title, n.content, n.created_at, n.is_root, n.embedding
             FROM edges e JOIN nodes n ON n.id = e.source_id
             WHERE e.target_id = ?1
             ORDER BY e.created_at, e.rowid
             LIMIT 1",
            params![node_id],
            Self::row_to_node,
        ).optional()
    }

    pub fn update_node_title(&self, node_id: &str, title: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE nodes SET title = ?2 WHERE id = ?1",
            params![node_id, title],
        )?;
        Ok(())
    }

    /// Delete a set of nodes and every edge touching them in one transaction.
    /// Returns the number of nodes removed.
    pub fn delete_nodes_by_ids(&self, node_ids: &[String]) -> Result<usize> {
        if node_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut delete_edges = tx.prepare("DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1")?;
            let mut delete_node = tx.prepare("DELETE FROM nodes WHERE id = ?1")?;
            for id in node_ids {
                delete_edges.execute(params![id])?;
                deleted += delete_node.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    // ==================== Edge operations ====================

    pub fn create_edge(&self, source_id: &str, target_id: &str) -> Result<Edge> {
        let edge = Edge {
            id: uuid::Uuid::new_v4().to_string(),
            source: source_id.to_string(),
            target: target_id.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO edges (id, source_id, target_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![edge.id, edge.source, edge.target, edge.created_at],
        )?;
        Ok(edge)
    }

    pub fn get_all_edges(&self) -> Result<Vec<Edge>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, source_id, target_id, created_at FROM edges ORDER BY created_at, rowid"
        )?;

        let edges = stmt.query_map([], Self::row_to_edge)?.collect::<Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// (node count, edge count)
    pub fn get_stats(&self) -> Result<(usize, usize)> {
        let conn = self.lock();
        let nodes: usize = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
        let edges: usize = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0))?;
        Ok((nodes, edges))
    }
}

/// Convert an embedding to raw little-endian bytes; empty maps to NULL
fn embedding_to_bytes(embedding: &[f32]) -> Option<Vec<u8>> {
    if embedding.is_empty() {
        return None;
    }
    Some(embedding.iter().flat_map(|f| f.to_le_bytes()).collect())
}

/// Convert raw bytes to f32 embedding vector
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks(4)
        .map(|chunk| {
            if chunk.len() == 4 {
                f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            } else {
                0.0
            }
        })
        .collect()
}
