//! SQLite persistence for embedding collections
//!
//! Each collection keeps its chunks, their source metadata and the raw embedding
//! vectors, so the vector index can be rebuilt on startup without re-embedding.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, SourceRef};

/// A chunk together with its embedding, as stored on disk
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Summary of one collection
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub dimensions: Option<usize>,
    pub count: usize,
    pub created_at: String,
}

/// SQLite-backed collection storage
pub struct CollectionDb {
    conn: Arc<Mutex<Connection>>,
}

impl CollectionDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::vector_db(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::vector_db(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            "#,
        )
        .map_err(|e| Error::vector_db(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_collection ON embeddings(collection);
            "#,
        )
        .map_err(|e| Error::vector_db(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    /// Create the collection if it does not exist yet
    pub fn ensure_collection(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, NULL, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Embedding dimension recorded for the collection, if any vector was stored
    pub fn dimensions(&self, name: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock();
        let dims: Option<Option<i64>> = conn
            .query_row(
                "SELECT dimensions FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dims.flatten().map(|d| d as usize))
    }

    /// Insert embeddings, ignoring ids already present. Returns the number inserted.
    pub fn insert_embeddings(&self, collection: &str, items: &[StoredEmbedding]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO embeddings (
                    collection, id, content, source, chunk_index, embedding, added_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            let now = Utc::now().to_rfc3339();
            for item in items {
                let source = serde_json::to_string(&item.chunk.source)?;
                inserted += stmt.execute(params![
                    collection,
                    item.chunk.id,
                    item.chunk.content,
                    source,
                    item.chunk.chunk_index as i64,
                    encode_vector(&item.embedding),
                    &now,
                ])?;
            }

            let dims = items[0].embedding.len() as i64;
            tx.execute(
                "UPDATE collections SET dimensions = ?2 WHERE name = ?1 AND dimensions IS NULL",
                params![collection, dims],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// All chunk ids stored in a collection
    pub fn ids(&self, collection: &str) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM embeddings WHERE collection = ?1")?;
        let ids = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Load every stored embedding of a collection in insertion order
    pub fn load_collection(&self, collection: &str) -> Result<Vec<StoredEmbedding>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, content, source, chunk_index, embedding
            FROM embeddings
            WHERE collection = ?1
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, content, source, chunk_index, blob) = row?;
            let source: SourceRef = match serde_json::from_str(&source) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping chunk {} with unreadable metadata: {}", id, e);
                    continue;
                }
            };

            items.push(StoredEmbedding {
                chunk: Chunk {
                    id,
                    content,
                    source,
                    chunk_index: chunk_index as u32,
                },
                embedding: decode_vector(&blob)?,
            });
        }

        Ok(items)
    }

    /// Number of embeddings in a collection
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Drop a collection and its embeddings. Returns the number of embeddings removed.
    pub fn delete_collection(&self, collection: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM embeddings WHERE collection = ?1",
            params![collection],
        )?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![collection])?;
        tx.commit()?;
        Ok(removed)
    }

    /// All collections with their sizes
    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT c.name, c.dimensions, c.created_at,
                   (SELECT COUNT(*) FROM embeddings e WHERE e.collection = c.name)
            FROM collections c
            ORDER BY c.name
            "#,
        )?;

        let collections = stmt
            .query_map([], |row| {
                Ok(CollectionInfo {
                    name: row.get(0)?,
                    dimensions: row.get::<_, Option<i64>>(1)?.map(|d| d as usize),
                    created_at: row.get(2)?,
                    count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(collections)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::vector_db(format!(
            "Corrupt embedding blob of {} bytes",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
