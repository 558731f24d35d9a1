//! SQLite persistence of enrolled embeddings.

use chrono::Utc;
use rollcall_core::{DimensionMismatch, Embedding, EmbeddingStore, StoreError};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("creating database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored embedding {id} is corrupt: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: DimensionMismatch,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One persisted enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFace {
    pub id: String,
    pub identity: String,
    pub name: String,
    #[serde(skip)]
    pub embedding: Embedding,
    pub created_at: String,
}

pub struct FaceDb {
    conn: Connection,
}

impl FaceDb {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS face_embeddings (
                id         TEXT PRIMARY KEY,
                identity   TEXT NOT NULL,
                name       TEXT NOT NULL,
                embedding  BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_face_embeddings_identity
                ON face_embeddings(identity);",
        )?;
        Ok(Self { conn })
    }

    pub fn insert(
        &self,
        identity: &str,
        name: &str,
        embedding: &Embedding,
    ) -> Result<StoredFace, DbError> {
        let face = StoredFace {
            id: uuid::Uuid::new_v4().to_string(),
            identity: identity.to_string(),
            name: name.to_string(),
            embedding: embedding.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO face_embeddings (id, identity, name, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![face.id, face.identity, face.name, embedding.to_le_bytes(), face.created_at],
        )?;
        tracing::debug!(id = %face.id, identity, "face persisted");
        Ok(face)
    }

    /// All rows, oldest first.
    pub fn load_all(&self) -> Result<Vec<StoredFace>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identity, name, embedding, created_at
             FROM face_embeddings ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut faces = Vec::new();
        for row in rows {
            let (id, identity, name, blob, created_at) = row?;
            let embedding = Embedding::from_le_bytes(&blob)
                .map_err(|source| DbError::Corrupt { id: id.clone(), source })?;
            faces.push(StoredFace { id, identity, name, embedding, created_at });
        }
        Ok(faces)
    }

    /// Remove every enrollment of `identity`; returns the number of rows deleted.
    pub fn delete_identity(&self, identity: &str) -> Result<usize, DbError> {
        Ok(self
            .conn
            .execute("DELETE FROM face_embeddings WHERE identity = ?1", params![identity])?)
    }

    /// Build an in-memory gallery from every stored row.
    pub fn load_store(&self) -> Result<EmbeddingStore, DbError> {
        let store = EmbeddingStore::new();
        for face in self.load_all()? {
            store.add(&face.embedding, &face.identity)?;
        }
        tracing::info!(records = store.len(), "gallery loaded");
        Ok(store)
    }
}

#[cfg(test)]
impl FaceDb {
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
