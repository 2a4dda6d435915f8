//! SQLite-backed repositories.
//!
//! One database file per repository. The change log and block hashes
//! are produced by an external indexer; the write-side helpers here
//! exist for that producer and for test fixtures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::core::{Change, ChangeKind, ClaimId, Hash, OutPoint};

use super::{BlockHashRepo, ChangeRepo, NodeBlobRepo, RepoError};

const BUSY_TIMEOUT_MS: u64 = 5_000;

fn open_connection(path: &Path, create: bool) -> Result<Connection, RepoError> {
    if create {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| RepoError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(path, flags)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

fn blob_hash(blob: Vec<u8>) -> Result<Hash, RepoError> {
    let bytes: [u8; 32] = blob
        .try_into()
        .map_err(|_| RepoError::RowDecode("hash blob wrong length".to_string()))?;
    Ok(Hash::from_bytes(bytes))
}

/// Content-addressed node blob store.
pub struct SqliteNodeBlobRepo {
    conn: Connection,
}

impl SqliteNodeBlobRepo {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let conn = open_connection(path, true)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS node_blobs (
               hash BLOB PRIMARY KEY,
               blob BLOB NOT NULL
             )",
        )?;
        Ok(Self { conn })
    }
}

impl NodeBlobRepo for SqliteNodeBlobRepo {
    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, RepoError> {
        let row = self
            .conn
            .query_row(
                "SELECT blob FROM node_blobs WHERE hash = ?1",
                params![hash.as_bytes().as_slice()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(row)
    }

    fn set(&mut self, hash: Hash, blob: &[u8]) -> Result<(), RepoError> {
        // Content-addressed: a duplicate write carries identical bytes.
        self.conn.execute(
            "INSERT OR IGNORE INTO node_blobs (hash, blob) VALUES (?1, ?2)",
            params![hash.as_bytes().as_slice(), blob],
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RepoError> {
        self.conn.execute_batch("PRAGMA optimize")?;
        Ok(())
    }
}

/// Tabular change log keyed by (height, seq).
pub struct SqliteChangeRepo {
    conn: Connection,
}

impl SqliteChangeRepo {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let conn = open_connection(path, true)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS changes (
               height INTEGER NOT NULL,
               seq INTEGER NOT NULL,
               kind TEXT NOT NULL,
               name BLOB NOT NULL,
               out_point TEXT NOT NULL,
               claim_id TEXT,
               amount INTEGER NOT NULL,
               value BLOB NOT NULL,
               visible_height INTEGER NOT NULL DEFAULT 0,
               PRIMARY KEY (height, seq)
             )",
        )?;
        Ok(Self { conn })
    }

    /// Append a change as the next row of its height. Producer-side.
    pub fn append(&mut self, change: &Change) -> Result<(), RepoError> {
        let next_seq: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM changes WHERE height = ?1",
            params![change.height],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO changes
               (height, seq, kind, name, out_point, claim_id, amount, value, visible_height)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                change.height,
                next_seq,
                change.kind.as_str(),
                change.name,
                change.out_point.to_string(),
                change.claim_id.map(|id| id.to_hex()),
                change.amount,
                change.value,
                change.visible_height,
            ],
        )?;
        Ok(())
    }
}

impl ChangeRepo for SqliteChangeRepo {
    fn load_by_height(&self, height: i32) -> Result<Vec<Change>, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, name, out_point, claim_id, amount, value, visible_height
             FROM changes WHERE height = ?1 ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![height])?;
        let mut changes = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            let name: Vec<u8> = row.get(1)?;
            let out_point: String = row.get(2)?;
            let claim_id: Option<String> = row.get(3)?;
            let amount: i64 = row.get(4)?;
            let value: Vec<u8> = row.get(5)?;
            let visible_height: i32 = row.get(6)?;

            let kind =
                ChangeKind::parse(&kind).map_err(|source| RepoError::ChangeRow { height, source })?;
            let out_point = OutPoint::parse(&out_point)
                .map_err(|source| RepoError::ChangeRow { height, source })?;
            let claim_id = claim_id
                .map(|raw| ClaimId::from_hex(&raw))
                .transpose()
                .map_err(|source| RepoError::ChangeRow { height, source })?;

            changes.push(Change {
                kind,
                name,
                out_point,
                claim_id,
                amount,
                value,
                height,
                visible_height,
            });
        }
        Ok(changes)
    }
}

/// Expected root hash per height.
pub struct SqliteBlockHashRepo {
    conn: Connection,
}

impl SqliteBlockHashRepo {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let conn = open_connection(path, true)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS block_hashes (
               height INTEGER PRIMARY KEY,
               hash BLOB NOT NULL
             )",
        )?;
        Ok(Self { conn })
    }

    /// Record the root hash for a height. Producer-side.
    pub fn set(&mut self, height: i32, hash: Hash) -> Result<(), RepoError> {
        self.conn.execute(
            "INSERT INTO block_hashes (height, hash) VALUES (?1, ?2)
             ON CONFLICT(height) DO UPDATE SET hash = excluded.hash",
            params![height, hash.as_bytes().as_slice()],
        )?;
        Ok(())
    }
}

impl BlockHashRepo for SqliteBlockHashRepo {
    fn get(&self, height: i32) -> Result<Option<Hash>, RepoError> {
        let row = self
            .conn
            .query_row(
                "SELECT hash FROM block_hashes WHERE height = ?1",
                params![height],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        row.map(blob_hash).transpose()
    }
}

/// Standard file names under a data directory.
pub fn node_blobs_path(data_dir: &Path) -> PathBuf {
    data_dir.join("nodes.sqlite")
}

pub fn changes_path(data_dir: &Path) -> PathBuf {
    data_dir.join("changes.sqlite")
}

pub fn block_hashes_path(data_dir: &Path) -> PathBuf {
    data_dir.join("blocks.sqlite")
}
