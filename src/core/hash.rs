//! 32-byte hashes and the double-SHA256 primitive.

use std::fmt;

use sha2::{Digest, Sha256};

use super::error::ParseError;

/// A 32-byte hash. Equality and ordering are byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse from a 64-char hex string.
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        if s.len() != 64 {
            return Err(ParseError::Hash {
                raw: s.to_string(),
                reason: format!("must be 64 hex chars (got {})", s.len()),
            });
        }
        let mut bytes = [0u8; 32];
        decode_hex(s, &mut bytes).map_err(|reason| ParseError::Hash {
            raw: s.to_string(),
            reason,
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// SHA-256 applied twice, the commitment primitive for trie nodes and
/// leaf contributions.
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash(second.into())
}

/// Decode `s` (even length, validated by the caller) into `out`.
pub(crate) fn decode_hex(s: &str, out: &mut [u8]) -> Result<(), String> {
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let pair =
            std::str::from_utf8(chunk).map_err(|_| "contains invalid UTF-8".to_string())?;
        out[i] = u8::from_str_radix(pair, 16)
            .map_err(|_| format!("contains invalid hex: {}", pair))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = Hash::from_bytes([0xab; 32]);
        assert_eq!(h.to_hex(), "ab".repeat(32));
        assert_eq!(Hash::from_hex(&h.to_hex()).unwrap(), h);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(Hash::from_hex("ab").is_err());
        assert!(Hash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn double_sha256_known_vector() {
        // sha256d of the empty string.
        let h = double_sha256(b"");
        assert_eq!(
            h.to_hex(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn to_hex_matches_reference_encoding() {
        let h = double_sha256(b"claim");
        assert_eq!(h.to_hex(), hex::encode(h.as_bytes()));
    }

    #[test]
    fn ordering_is_byte_wise() {
        let a = Hash::from_bytes([0u8; 32]);
        let mut high = [0u8; 32];
        high[0] = 1;
        let b = Hash::from_bytes(high);
        assert!(a < b);
    }
}
