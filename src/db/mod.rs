//! Database module for long-term conversation memory

pub mod embedder;
pub mod memory;
mod schema;

use std::path::Path;
use std::sync::Once;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

static SQLITE_VEC_INIT: Once = Once::new();

/// Database file name inside the memory directory
pub const DB_FILE_NAME: &str = "memory.db";

/// Register sqlite-vec extension for all new connections
///
/// This must be called before creating any database connections.
/// Safe to call multiple times; only the first call has any effect.
#[allow(unsafe_code)]
pub(crate) fn register_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the entry point exported by the sqlite-vec
        // crate and has the signature `SQLite` expects for auto extensions; only
        // the function pointer type is reinterpreted.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut rusqlite::ffi::sqlite3,
                    *mut *mut std::os::raw::c_char,
                    *const rusqlite::ffi::sqlite3_api_routines,
                ) -> i32,
            >(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

pub use embedder::{Embed, OpenAiEmbedder, EMBEDDING_DIM};
pub use memory::{MemoryBackend, MemoryRecord, MemoryStore, Retrieval};
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Open (or create) the memory database inside `dir`
///
/// The directory is created on first use.
///
/// # Errors
///
/// Returns error if the directory or database cannot be created or migrated
pub fn init<P: AsRef<Path>>(dir: P, embedding_dim: usize) -> Result<DbPool> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    register_sqlite_vec();

    let manager = SqliteConnectionManager::file(dir.join(DB_FILE_NAME));
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    schema::init(&conn, embedding_dim)?;

    tracing::info!(
        path = %dir.display(),
        version = SCHEMA_VERSION,
        journal_mode = %mode,
        "memory database initialized"
    );
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory(embedding_dim: usize) -> Result<DbPool> {
    register_sqlite_vec();

    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn, embedding_dim)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory(8).unwrap();
        let _conn = pool.get().unwrap();
    }

    #[test]
    fn test_init_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("memory");
        let _pool = init(&dir, 8).unwrap();
        assert!(dir.join(DB_FILE_NAME).exists());
    }
}
