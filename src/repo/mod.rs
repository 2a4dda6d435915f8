//! Repository traits for trie node blobs, the change log, and the
//! expected per-height root hashes.
//!
//! The core treats all repository calls as synchronous and ordered;
//! errors are fatal to the operation in flight and recovery is
//! restart-based.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::{Change, Hash, ParseError};

mod memory;
mod sqlite;

pub use memory::{MemoryBlockHashRepo, MemoryChangeRepo, MemoryNodeBlobRepo};
pub use sqlite::{
    block_hashes_path, changes_path, node_blobs_path, SqliteBlockHashRepo, SqliteChangeRepo,
    SqliteNodeBlobRepo,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("change row at height {height} is malformed: {source}")]
    ChangeRow {
        height: i32,
        #[source]
        source: ParseError,
    },
    #[error("row decode failed: {0}")]
    RowDecode(String),
}

/// Content-addressed store for serialized trie nodes. Writes are
/// idempotent: a hash always maps to the same blob.
pub trait NodeBlobRepo {
    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, RepoError>;
    fn set(&mut self, hash: Hash, blob: &[u8]) -> Result<(), RepoError>;
    fn close(&mut self) -> Result<(), RepoError>;
}

/// The change log: ordered changes per height.
pub trait ChangeRepo {
    fn load_by_height(&self, height: i32) -> Result<Vec<Change>, RepoError>;
}

/// Recorded root hashes to validate replay against.
pub trait BlockHashRepo {
    fn get(&self, height: i32) -> Result<Option<Hash>, RepoError>;
}
