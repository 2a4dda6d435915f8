//! Core domain errors (ingress parsing).
//!
//! These are bounded and stable: core errors represent malformed ingress
//! data, not library implementation details.

use thiserror::Error;

/// Invalid ingress-form value.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ParseError {
    #[error("hash `{raw}` is invalid: {reason}")]
    Hash { raw: String, reason: String },
    #[error("outpoint `{raw}` is invalid: {reason}")]
    OutPoint { raw: String, reason: String },
    #[error("claim id `{raw}` is invalid: {reason}")]
    ClaimId { raw: String, reason: String },
    #[error("change kind `{raw}` is unknown")]
    ChangeKind { raw: String },
}
