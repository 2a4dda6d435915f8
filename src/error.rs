//! Top-level error type aggregating the layer errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::ParseError;
use crate::param::WorkaroundsParseError;
use crate::replay::ReplayError;
use crate::repo::RepoError;
use crate::trie::TrieError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workarounds(#[from] WorkaroundsParseError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
