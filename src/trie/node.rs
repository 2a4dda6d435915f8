//! In-memory trie nodes and the persisted node blob codec.
//!
//! Blob layout: byte 0 bit 0 is the value flag; the remainder is a
//! sequence of (branch byte, 32-byte child hash) records in strictly
//! ascending branch order.

use thiserror::Error;

use crate::core::Hash;

const RECORD_LEN: usize = 33;
const HAS_VALUE_FLAG: u8 = 0x01;

/// A node of the in-memory tree. `hash == None` means the subtree is
/// dirty and must be rehashed; a node with a hash and no links is known
/// by hash only and resolves lazily from the blob store.
pub(crate) struct TrieNode {
    pub hash: Option<Hash>,
    pub has_value: bool,
    pub links: [Option<Box<TrieNode>>; 256],
}

impl TrieNode {
    pub fn new() -> Self {
        Self {
            hash: None,
            has_value: false,
            links: std::array::from_fn(|_| None),
        }
    }

    pub fn has_links(&self) -> bool {
        self.links.iter().any(|link| link.is_some())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobDecodeError {
    #[error("blob is empty")]
    Empty,
    #[error("blob length {len} is not 1 + 33n")]
    Length { len: usize },
    #[error("branch out of order at record {index}")]
    BranchOrder { index: usize },
}

pub(crate) fn encode_node_blob(has_value: bool, children: &[(u8, Hash)]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(1 + children.len() * RECORD_LEN);
    blob.push(if has_value { HAS_VALUE_FLAG } else { 0 });
    for (branch, hash) in children {
        blob.push(*branch);
        blob.extend_from_slice(hash.as_bytes());
    }
    blob
}

pub(crate) fn decode_node_blob(
    blob: &[u8],
) -> Result<(bool, Vec<(u8, Hash)>), BlobDecodeError> {
    let Some((&flags, rest)) = blob.split_first() else {
        return Err(BlobDecodeError::Empty);
    };
    if rest.len() % RECORD_LEN != 0 {
        return Err(BlobDecodeError::Length { len: blob.len() });
    }
    let mut children = Vec::with_capacity(rest.len() / RECORD_LEN);
    let mut previous: Option<u8> = None;
    for (index, record) in rest.chunks_exact(RECORD_LEN).enumerate() {
        let branch = record[0];
        if previous.is_some_and(|p| p >= branch) {
            return Err(BlobDecodeError::BranchOrder { index });
        }
        previous = Some(branch);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&record[1..]);
        children.push((branch, Hash::from_bytes(bytes)));
    }
    Ok((flags & HAS_VALUE_FLAG != 0, children))
}
