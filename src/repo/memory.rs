//! In-memory repositories for tests and ephemeral runs.

use std::collections::{BTreeMap, HashMap};

use crate::core::{Change, Hash};

use super::{BlockHashRepo, ChangeRepo, NodeBlobRepo, RepoError};

#[derive(Debug, Default)]
pub struct MemoryNodeBlobRepo {
    blobs: HashMap<Hash, Vec<u8>>,
}

impl MemoryNodeBlobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl NodeBlobRepo for MemoryNodeBlobRepo {
    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, RepoError> {
        Ok(self.blobs.get(hash).cloned())
    }

    fn set(&mut self, hash: Hash, blob: &[u8]) -> Result<(), RepoError> {
        self.blobs.entry(hash).or_insert_with(|| blob.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryChangeRepo {
    by_height: BTreeMap<i32, Vec<Change>>,
}

impl MemoryChangeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.by_height.entry(change.height).or_default().push(change);
    }
}

impl ChangeRepo for MemoryChangeRepo {
    fn load_by_height(&self, height: i32) -> Result<Vec<Change>, RepoError> {
        Ok(self.by_height.get(&height).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlockHashRepo {
    by_height: BTreeMap<i32, Hash>,
}

impl MemoryBlockHashRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, height: i32, hash: Hash) {
        self.by_height.insert(height, hash);
    }
}

impl BlockHashRepo for MemoryBlockHashRepo {
    fn get(&self, height: i32) -> Result<Option<Hash>, RepoError> {
        Ok(self.by_height.get(&height).copied())
    }
}
