//! 256-way authenticated prefix trie with lazy node resolution and
//! dirty-path rehashing.
//!
//! Single-writer: one owner mutates the trie between `update` calls and
//! a completed `merkle_hash`.

mod node;

use thiserror::Error;

use crate::core::{double_sha256, Hash};
use crate::repo::{NodeBlobRepo, RepoError};

use node::{decode_node_blob, encode_node_blob, TrieNode};

pub use node::BlobDecodeError;

/// Root hash of a trie with no leaf contributions: all zeros with the
/// final byte 0x01. Intentionally has no stored blob.
pub const EMPTY_TRIE_HASH: Hash = Hash::from_bytes([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
]);

/// Source of leaf contributions, queried during rehash. Must be a
/// deterministic function of current node state.
pub trait ValueStore {
    /// 32-byte leaf contribution for `name`, or `None` when the name has
    /// no winning claim.
    fn get(&self, name: &[u8]) -> Option<Hash>;
}

#[derive(Debug, Error)]
pub enum TrieError {
    #[error("node blob repo: {0}")]
    Repo(#[from] RepoError),
    #[error("node blob {hash} is corrupt: {source}")]
    Decode {
        hash: Hash,
        #[source]
        source: BlobDecodeError,
    },
}

/// The prefix trie, keyed by raw name bytes.
pub struct MerkleTrie {
    repo: Box<dyn NodeBlobRepo>,
    root: TrieNode,
}

impl MerkleTrie {
    pub fn new(repo: Box<dyn NodeBlobRepo>) -> Self {
        let mut trie = Self {
            repo,
            root: TrieNode::new(),
        };
        trie.set_root(EMPTY_TRIE_HASH);
        trie
    }

    /// Discard the in-memory tree and install an unresolved root.
    pub fn set_root(&mut self, hash: Hash) {
        let mut root = TrieNode::new();
        root.hash = Some(hash);
        self.root = root;
    }

    /// Mark every node on the path to `key` dirty, creating missing
    /// children, and flag the terminal node as value-bearing.
    pub fn update(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let repo = self.repo.as_ref();
        let mut current = &mut self.root;
        for &branch in key {
            resolve(current, repo)?;
            current.hash = None;
            current = current.links[branch as usize]
                .get_or_insert_with(|| Box::new(TrieNode::new()))
                .as_mut();
        }
        resolve(current, repo)?;
        current.has_value = true;
        current.hash = None;
        Ok(())
    }

    /// Recompute dirty subtrees, persisting each recomputed node's blob
    /// under its hash, and return the root hash.
    pub fn merkle_hash(&mut self, values: &dyn ValueStore) -> Result<Hash, TrieError> {
        let mut prefix = Vec::with_capacity(64);
        let root = merkle(&mut self.root, &mut prefix, values, self.repo.as_mut())?;
        Ok(root.unwrap_or(EMPTY_TRIE_HASH))
    }

    pub fn close(&mut self) -> Result<(), TrieError> {
        self.repo.close().map_err(TrieError::from)
    }
}

/// Populate a node known only by hash from its stored blob. A blob
/// missing from the store resolves to an empty node, which is how the
/// sentinel root of a fresh trie behaves.
fn resolve(node: &mut TrieNode, repo: &dyn NodeBlobRepo) -> Result<(), TrieError> {
    let Some(hash) = node.hash else {
        return Ok(());
    };
    if node.has_links() {
        return Ok(());
    }
    let Some(blob) = repo.get(&hash)? else {
        return Ok(());
    };
    let (has_value, children) =
        decode_node_blob(&blob).map_err(|source| TrieError::Decode { hash, source })?;
    node.has_value = has_value;
    for (branch, child_hash) in children {
        let mut child = TrieNode::new();
        child.hash = Some(child_hash);
        node.links[branch as usize] = Some(Box::new(child));
    }
    Ok(())
}

/// Recursively hash a subtree. A clean subtree's hash is reused as-is.
/// Returns `None` for empty subtrees, pruning them from the parent.
fn merkle(
    node: &mut TrieNode,
    prefix: &mut Vec<u8>,
    values: &dyn ValueStore,
    repo: &mut dyn NodeBlobRepo,
) -> Result<Option<Hash>, TrieError> {
    if let Some(hash) = node.hash {
        return Ok(Some(hash));
    }

    let mut payload = Vec::new();
    let mut children: Vec<(u8, Hash)> = Vec::new();
    for (branch, link) in node.links.iter_mut().enumerate() {
        let Some(child) = link else { continue };
        prefix.push(branch as u8);
        let child_hash = merkle(child, prefix, values, repo)?;
        prefix.pop();
        if let Some(child_hash) = child_hash {
            payload.push(branch as u8);
            payload.extend_from_slice(child_hash.as_bytes());
            children.push((branch as u8, child_hash));
        }
    }

    if node.has_value {
        if let Some(leaf) = values.get(prefix) {
            payload.extend_from_slice(leaf.as_bytes());
        }
    }

    if payload.is_empty() {
        return Ok(None);
    }

    let hash = double_sha256(&payload);
    repo.set(hash, &encode_node_blob(node.has_value, &children))?;
    node.hash = Some(hash);
    Ok(Some(hash))
}
