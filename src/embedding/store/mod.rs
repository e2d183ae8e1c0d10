//! Persistent vector store
//!
//! SQLite-backed `(document_id, embedding)` rows plus a key/value metadata
//! table. The dense index persists here so that reopening it never calls the
//! embedding service.

use crate::embedding::Embedding;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Embedding store backed by SQLite
pub struct EmbeddingStore {
    conn: Connection,
    model_name: String,
}

impl EmbeddingStore {
    /// Open (or create) a store at the given path
    pub fn open(db_path: &Path, model_name: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .context(format!("Failed to open embedding store: {:?}", db_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS vectors (
                doc_id INTEGER PRIMARY KEY,
                model_name TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn,
            model_name: model_name.to_string(),
        })
    }

    /// Serialize an embedding to bytes
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|&f| f.to_le_bytes()).collect()
    }

    /// Deserialize an embedding from bytes
    fn deserialize_embedding(bytes: &[u8]) -> Result<Embedding> {
        if bytes.len() % 4 != 0 {
            anyhow::bail!("Invalid embedding bytes length");
        }

        let mut embedding = Vec::with_capacity(bytes.len() / 4);
        for chunk in bytes.chunks_exact(4) {
            let bytes: [u8; 4] = chunk.try_into()?;
            embedding.push(f32::from_le_bytes(bytes));
        }

        Ok(embedding)
    }

    /// Store every `(doc_id, embedding)` pair in one transaction
    pub fn put_all(&mut self, entries: &[(usize, Embedding)]) -> Result<()> {
        let created_at = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO vectors
                 (doc_id, model_name, embedding, dimension, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (doc_id, embedding) in entries {
                stmt.execute(params![
                    *doc_id as i64,
                    self.model_name,
                    Self::serialize_embedding(embedding),
                    embedding.len() as i64,
                    created_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load every stored vector, ordered by document id
    pub fn load_all(&self) -> Result<Vec<(usize, Embedding)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_id, embedding FROM vectors ORDER BY doc_id")?;

        let rows = stmt.query_map([], |row| {
            let doc_id: i64 = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((doc_id, bytes))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (doc_id, bytes) = row?;
            entries.push((doc_id as usize, Self::deserialize_embedding(&bytes)?));
        }
        Ok(entries)
    }

    /// Number of stored vectors
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Set a metadata value
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
