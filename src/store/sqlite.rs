//! SQLite + sqlite-vec storage backend.
//!
//! One collection maps to one SQLite file holding a `chunks` table and a
//! `chunk_embeddings` vec0 virtual table. The `chunks` rowid doubles as the
//! insertion sequence, which is what breaks similarity ties in search.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::Backend;
use crate::types::{Chunk, IndexEntry, PipelineError, ScoredChunk};

#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
    dims: usize,
}

impl SqliteChunkStore {
    /// Opens (creating if necessary) the collection at `path`, with embedding
    /// vectors of `dims` dimensions.
    pub async fn open(path: impl AsRef<Path>, dims: usize) -> Result<Self, PipelineError> {
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::IndexUnavailable(err.to_string()))?;

        conn.call(move |conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT NOT NULL UNIQUE,
                    source TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    page INTEGER,
                    content TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
                [],
            )?;
            conn.execute(
                &format!(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_embeddings \
                     USING vec0(embedding float[{dims}])"
                ),
                [],
            )?;
            Ok(())
        })
        .await
        .map_err(|err: tokio_rusqlite::Error| PipelineError::IndexUnavailable(err.to_string()))?;

        Ok(Self { conn, dims })
    }

    /// Underlying connection, for queries this type does not cover.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Backend for SqliteChunkStore {
    async fn insert_entries(&self, entries: Vec<IndexEntry>) -> Result<(), PipelineError> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            if entry.embedding.len() != self.dims {
                return Err(PipelineError::IndexUnavailable(format!(
                    "embedding has {} dimensions, collection expects {}",
                    entry.embedding.len(),
                    self.dims
                )));
            }
        }

        // single transaction: an aborted ingestion leaves no partial chunk set
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for entry in entries {
                    tx.execute(
                        "INSERT INTO chunks (id, source, chunk_index, page, content) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        (
                            &entry.id,
                            &entry.chunk.source_ref,
                            entry.chunk.sequence_index as i64,
                            entry.chunk.page.map(|p| p as i64),
                            &entry.chunk.text,
                        ),
                    )?;
                    let seq = tx.last_insert_rowid();
                    let vector = serde_json::to_string(&entry.embedding)
                        .map_err(|err| {
                            tokio_rusqlite::rusqlite::Error::ToSqlConversionFailure(Box::new(err))
                        })?;
                    tx.execute(
                        "INSERT INTO chunk_embeddings (rowid, embedding) VALUES (?1, ?2)",
                        (seq, vector),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::IndexUnavailable(err.to_string()))
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let vector = serde_json::to_string(query_embedding)
            .map_err(|err| PipelineError::IndexUnavailable(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.source, c.chunk_index, c.page, c.content, \
                            vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunk_embeddings e ON e.rowid = c.rowid \
                     ORDER BY distance ASC, c.rowid ASC \
                     LIMIT ?2",
                )?;

                let rows = stmt.query_map((vector, top_k as i64), |row| {
                    let mut chunk = Chunk::new(
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)? as usize,
                    );
                    chunk.page = row.get::<_, Option<i64>>(3)?.map(|p| p as usize);
                    let distance: f32 = row.get(5)?;
                    Ok(ScoredChunk {
                        id: row.get(0)?,
                        chunk,
                        similarity: 1.0 - distance,
                    })
                })?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::IndexUnavailable(err.to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::IndexUnavailable(err.to_string()))
    }
}

/// Registers the sqlite-vec extension for every subsequent connection.
/// Process-wide, performed once.
fn register_sqlite_vec() -> Result<(), PipelineError> {
    static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTRATION
        .get_or_init(|| unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != ffi::SQLITE_OK {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        })
        .clone()
        .map_err(PipelineError::IndexUnavailable)
}
