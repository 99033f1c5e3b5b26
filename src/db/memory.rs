//! Similarity memory store for archived conversation summaries
//!
//! Records are append-only: the archival path is the only writer, and
//! records are never updated or deleted. Ids come from `SQLite`'s
//! `AUTOINCREMENT` counter, so they only grow and are never reused.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};

use super::embedder::{Embed, OpenAiEmbedder};
use super::DbPool;
use crate::{Error, Result};

/// A persisted, timestamped summary of an archived conversation segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub id: i64,
    pub summary: String,
    pub created_at: DateTime<FixedOffset>,
}

/// Outcome of a similarity query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// Nearest records, most similar first
    Found(Vec<MemoryRecord>),
    /// Nothing has been archived yet
    EmptyStore,
}

impl Retrieval {
    #[must_use]
    pub fn into_records(self) -> Vec<MemoryRecord> {
        match self {
            Self::Found(records) => records,
            Self::EmptyStore => Vec::new(),
        }
    }

    /// Summary texts in similarity order
    #[must_use]
    pub fn summaries(&self) -> Vec<&str> {
        match self {
            Self::Found(records) => records.iter().map(|r| r.summary.as_str()).collect(),
            Self::EmptyStore => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Found(records) => records.is_empty(),
            Self::EmptyStore => true,
        }
    }
}

/// Write and search operations the conversation needs from a memory store
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Append a summary and return the stored record
    async fn add(&self, summary: &str, created_at: DateTime<FixedOffset>) -> Result<MemoryRecord>;

    /// Find up to `k` records nearest to `text`
    async fn query(&self, text: &str, k: usize) -> Result<Retrieval>;

    /// Number of stored records
    fn count(&self) -> Result<usize>;

    /// Make committed writes durable
    fn persist(&self) -> Result<()>;
}

/// Column list for all memory SELECT queries
const MEMORY_COLUMNS: &str = "id, summary, created_at";

/// Memory store backed by `SQLite` and a sqlite-vec index
#[derive(Clone)]
pub struct MemoryStore {
    pool: DbPool,
    embedder: Arc<dyn Embed>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Open the store persisted in `dir`, creating it on first use
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or was created for a
    /// different embedding dimension
    pub fn open<P: AsRef<Path>>(dir: P, embedder: Arc<dyn Embed>) -> Result<Self> {
        let pool = super::init(dir, embedder.dimension())?;
        Ok(Self { pool, embedder })
    }

    /// Open a throwaway in-memory store
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be initialized
    pub fn in_memory(embedder: Arc<dyn Embed>) -> Result<Self> {
        let pool = super::init_memory(embedder.dimension())?;
        Ok(Self { pool, embedder })
    }

    /// Embed and append a summary, then return the stored record
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the database write fails
    pub async fn add(&self, summary: &str, created_at: DateTime<FixedOffset>) -> Result<MemoryRecord> {
        let embedding = self.embedder.embed(summary).await?;
        if embedding.len() != self.embedder.dimension() {
            return Err(Error::Embedding(format!(
                "expected {} dimensions, got {}",
                self.embedder.dimension(),
                embedding.len()
            )));
        }

        let mut conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO memories (summary, created_at) VALUES (?1, ?2)",
            rusqlite::params![summary, created_at.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO memories_vec (rowid, embedding) VALUES (?1, ?2)",
            rusqlite::params![id, OpenAiEmbedder::to_bytes(&embedding)],
        )?;
        tx.commit()?;

        tracing::debug!(id, chars = summary.len(), "memory added");

        Ok(MemoryRecord {
            id,
            summary: summary.to_string(),
            created_at,
        })
    }

    /// Append a summary stamped with the current local time
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the database write fails
    pub async fn add_now(&self, summary: &str) -> Result<MemoryRecord> {
        self.add(summary, Local::now().fixed_offset()).await
    }

    /// Find up to `k` records nearest to `text`
    ///
    /// `k` is clamped to the number of stored records; an empty store is
    /// reported as [`Retrieval::EmptyStore`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the database query fails
    pub async fn query(&self, text: &str, k: usize) -> Result<Retrieval> {
        let count = self.count()?;
        if count == 0 {
            tracing::debug!("memory store is empty, nothing to retrieve");
            return Ok(Retrieval::EmptyStore);
        }

        let k = k.min(count);
        if k == 0 || text.trim().is_empty() {
            return Ok(Retrieval::Found(Vec::new()));
        }

        let embedding = self.embedder.embed(text).await?;
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            r"SELECT m.id, m.summary, m.created_at
              FROM (
                  SELECT rowid, distance
                  FROM memories_vec
                  WHERE embedding MATCH ?1
                  ORDER BY distance
                  LIMIT ?2
              ) v
              INNER JOIN memories m ON m.id = v.rowid
              ORDER BY v.distance",
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map(
            rusqlite::params![OpenAiEmbedder::to_bytes(&embedding), k as i64],
            row_to_memory_row,
        )?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(MemoryRow::into_record)
            .collect::<Vec<_>>();

        tracing::debug!(requested = k, found = records.len(), "memories retrieved");
        Ok(Retrieval::Found(records))
    }

    /// Number of stored records
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails
    pub fn count(&self) -> Result<usize> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Get a record by id
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails
    pub fn get(&self, id: i64) -> Result<Option<MemoryRecord>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
            [id],
            row_to_memory_row,
        );

        match result {
            Ok(row) => Ok(Some(row.into_record())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent records, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails
    pub fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories ORDER BY id DESC LIMIT ?1"
        ))?;

        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map([limit as i64], row_to_memory_row)?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(MemoryRow::into_record)
            .collect();
        Ok(records)
    }

    /// Flush the write-ahead log into the main database file
    ///
    /// # Errors
    ///
    /// Returns error if the checkpoint fails
    pub fn persist(&self) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let (busy, log_frames, checkpointed): (i64, i64, i64) = conn.query_row(
            "PRAGMA wal_checkpoint(TRUNCATE)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        if busy != 0 {
            tracing::warn!(log_frames, checkpointed, "memory checkpoint incomplete");
        } else {
            tracing::trace!(log_frames, checkpointed, "memory store persisted");
        }

        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for MemoryStore {
    async fn add(&self, summary: &str, created_at: DateTime<FixedOffset>) -> Result<MemoryRecord> {
        Self::add(self, summary, created_at).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<Retrieval> {
        Self::query(self, text, k).await
    }

    fn count(&self) -> Result<usize> {
        Self::count(self)
    }

    fn persist(&self) -> Result<()> {
        Self::persist(self)
    }
}

/// Map a database row to a `MemoryRow`
fn row_to_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    Ok(MemoryRow {
        id: row.get(0)?,
        summary: row.get(1)?,
        created_at: row.get(2)?,
    })
}

/// Internal struct for database row mapping
struct MemoryRow {
    id: i64,
    summary: String,
    created_at: String,
}

impl MemoryRow {
    fn into_record(self) -> MemoryRecord {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at).unwrap_or_else(|e| {
            tracing::warn!(id = self.id, error = %e, "unparseable memory timestamp");
            Local::now().fixed_offset()
        });

        MemoryRecord {
            id: self.id,
            summary: self.summary,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// Embeds text as a one-hot vector over a handful of topics
    struct TopicEmbedder;

    const TOPICS: [&str; 4] = ["pizza", "soccer", "music", "school"];

    #[async_trait]
    impl Embed for TopicEmbedder {
        fn dimension(&self) -> usize {
            TOPICS.len() + 1
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let mut v = vec![0.0; TOPICS.len() + 1];
            for (i, topic) in TOPICS.iter().enumerate() {
                if lower.contains(topic) {
                    v[i] = 1.0;
                }
            }
            if v.iter().all(|x| *x == 0.0) {
                v[TOPICS.len()] = 1.0;
            }
            Ok(v)
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::in_memory(Arc::new(TopicEmbedder)).unwrap()
    }

    #[tokio::test]
    async fn empty_store_returns_empty_store() {
        let store = store();
        let retrieval = store.query("anything", 4).await.unwrap();
        assert_eq!(retrieval, Retrieval::EmptyStore);
        assert!(retrieval.is_empty());
        assert!(retrieval.summaries().is_empty());
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let store = store();
        let a = store.add_now("I like pizza").await.unwrap();
        let b = store.add_now("I play soccer").await.unwrap();
        let c = store.add_now("I sing music").await.unwrap();

        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn query_clamps_to_count() {
        let store = store();
        store.add_now("We ate pizza").await.unwrap();
        store.add_now("We watched soccer").await.unwrap();

        let retrieval = store.query("pizza", 10).await.unwrap();
        assert_eq!(retrieval.summaries().len(), 2);
    }

    #[tokio::test]
    async fn query_orders_by_similarity() {
        let store = store();
        store.add_now("We talked about soccer").await.unwrap();
        store.add_now("We talked about pizza").await.unwrap();
        store.add_now("We talked about music").await.unwrap();

        let retrieval = store.query("do you remember the pizza?", 1).await.unwrap();
        assert_eq!(retrieval.summaries(), vec!["We talked about pizza"]);
    }

    #[tokio::test]
    async fn get_and_recent() {
        let store = store();
        let first = store.add_now("first pizza").await.unwrap();
        let second = store.add_now("second soccer").await.unwrap();

        let fetched = store.get(first.id).unwrap().unwrap();
        assert_eq!(fetched.summary, "first pizza");
        assert_eq!(fetched.created_at, first.created_at);
        assert!(store.get(999).unwrap().is_none());

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.id);
    }

    #[tokio::test]
    async fn persist_on_memory_store_is_ok() {
        let store = store();
        store.add_now("school day").await.unwrap();
        store.persist().unwrap();
    }

    #[test]
    fn retrieval_into_records() {
        assert!(Retrieval::EmptyStore.into_records().is_empty());
        let record = MemoryRecord {
            id: 1,
            summary: "hi".to_string(),
            created_at: Local::now().fixed_offset(),
        };
        let found = Retrieval::Found(vec![record.clone()]);
        assert_eq!(found.into_records(), vec![record]);
    }
}
