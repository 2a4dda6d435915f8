//! Core domain: hashes, outpoints, claims, changes, and the per-name
//! node state machine.

mod change;
mod claim;
mod error;
mod hash;
mod node;
mod outpoint;

pub use change::{Change, ChangeKind};
pub use claim::{Claim, Status};
pub use error::ParseError;
pub use hash::{double_sha256, Hash};
pub use node::{ApplyWarning, Node};
pub use outpoint::{ClaimId, OutPoint};
