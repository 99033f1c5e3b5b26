//! Database schema and migrations

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// The vector table is sized for `embedding_dim`; re-opening a database
/// created with another dimension fails.
///
/// # Errors
///
/// Returns error if migration fails or the stored dimension differs
pub fn init(conn: &Connection, embedding_dim: usize) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn, embedding_dim)?;
    }

    check_embedding_dim(conn, embedding_dim)
}

fn migrate_v1(conn: &Connection, embedding_dim: usize) -> Result<()> {
    conn.execute_batch(&format!(
        r"
        -- Archived conversation summaries (append-only)
        CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            summary TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Store-level settings
        CREATE TABLE IF NOT EXISTS store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT OR IGNORE INTO store_meta (key, value) VALUES ('embedding_dim', '{embedding_dim}');

        -- Summary embeddings, rowid = memories.id
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec USING vec0(
            embedding FLOAT[{embedding_dim}]
        );

        PRAGMA user_version = 1;
        "
    ))?;

    tracing::info!(embedding_dim, "migrated to schema v1");
    Ok(())
}

fn check_embedding_dim(conn: &Connection, embedding_dim: usize) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'embedding_dim'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match stored.as_deref().map(str::parse::<usize>) {
        Some(Ok(dim)) if dim == embedding_dim => Ok(()),
        Some(Ok(dim)) => Err(Error::Config(format!(
            "memory store was created for {dim}-dimensional embeddings, embedder produces {embedding_dim}"
        ))),
        Some(Err(e)) => Err(Error::Database(format!("corrupt embedding_dim: {e}"))),
        None => Err(Error::Database("missing embedding_dim".to_string())),
    }
}
