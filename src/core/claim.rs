//! Claim and support records.

use super::outpoint::{ClaimId, OutPoint};

/// Lifecycle of a claim or support within its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Seen, but not yet counting for takeover.
    Accepted,
    /// Counting for takeover.
    Activated,
    /// Spent; swept out on the next advance.
    Deactivated,
}

/// A staked claim on a name. Supports use the same shape; their value
/// payload is unused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub out_point: OutPoint,
    pub claim_id: ClaimId,
    pub amount: i64,
    pub value: Vec<u8>,
    /// Height first seen.
    pub accepted_at: i32,
    /// Height at which it counts for takeover.
    pub active_at: i32,
    /// Height at which it becomes visible; may equal accepted_at.
    pub visible_at: i32,
    /// accepted_at + the chain's expiration span for that height.
    pub expires_at: i32,
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Hash;

    #[test]
    fn claim_fields_hold_heights() {
        let claim = Claim {
            out_point: OutPoint::new(Hash::from_bytes([1; 32]), 0),
            claim_id: ClaimId::from_bytes([2; 20]),
            amount: 10,
            value: Vec::new(),
            accepted_at: 5,
            active_at: 7,
            visible_at: 5,
            expires_at: 505,
            status: Status::Accepted,
        };
        assert!(claim.active_at >= claim.accepted_at);
        assert!(claim.visible_at >= claim.accepted_at);
    }
}
