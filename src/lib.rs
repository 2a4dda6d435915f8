#![forbid(unsafe_code)]

//! An authenticated, height-indexed claim registry: competing claims on
//! short byte-string names are replayed block by block, winners are
//! elected under delayed-takeover rules, and a Merkle prefix trie
//! commits to the full (name, winning claim) mapping at every height.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod param;
pub mod replay;
pub mod repo;
pub mod telemetry;
pub mod trie;

mod claimtrie;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::claimtrie::ClaimTrie;
pub use crate::core::{
    double_sha256, ApplyWarning, Change, ChangeKind, Claim, ClaimId, Hash, Node, OutPoint,
    ParseError, Status,
};
pub use crate::param::ChainParams;
pub use crate::trie::{MerkleTrie, ValueStore, EMPTY_TRIE_HASH};
