//! Transaction outpoints and claim identifiers.

use std::fmt;

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::error::ParseError;
use super::hash::{decode_hex, Hash};

/// A transaction output reference: (txid, output index).
///
/// The string form `"<64 hex>:<index>"` appears only at ingress.
/// Ordering is by txid bytes, then index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// Parse the ingress form `"<64 hex>:<index>"`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let Some((txid_raw, index_raw)) = s.split_once(':') else {
            return Err(ParseError::OutPoint {
                raw: s.to_string(),
                reason: "must contain ':' separator".into(),
            });
        };
        let txid = Hash::from_hex(txid_raw).map_err(|_| ParseError::OutPoint {
            raw: s.to_string(),
            reason: "txid must be 64 hex chars".into(),
        })?;
        let index = index_raw.parse::<u32>().map_err(|_| ParseError::OutPoint {
            raw: s.to_string(),
            reason: "index must be a u32".into(),
        })?;
        Ok(Self { txid, index })
    }
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutPoint({}:{})", self.txid, self.index)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A 20-byte claim identifier, hex-encoded at ingress.
///
/// Stable across claim updates; newly added claims derive theirs from
/// the claim's outpoint.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClaimId([u8; 20]);

impl ClaimId {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the identifier for a new claim:
    /// `ripemd160(sha256(txid || le32(index)))`.
    pub fn from_outpoint(op: &OutPoint) -> Self {
        let mut buf = [0u8; 36];
        buf[..32].copy_from_slice(op.txid.as_bytes());
        buf[32..].copy_from_slice(&op.index.to_le_bytes());
        let sha = Sha256::digest(buf);
        Self(Ripemd160::digest(sha).into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse from a 40-char hex string.
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        if s.len() != 40 {
            return Err(ParseError::ClaimId {
                raw: s.to_string(),
                reason: format!("must be 40 hex chars (got {})", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        decode_hex(s, &mut bytes).map_err(|reason| ParseError::ClaimId {
            raw: s.to_string(),
            reason,
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", self.to_hex())
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
