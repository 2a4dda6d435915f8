//! Tagged change records, the unit of the replayed event stream.

use super::error::ParseError;
use super::outpoint::{ClaimId, OutPoint};

/// What a change does to its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    AddClaim,
    SpendClaim,
    UpdateClaim,
    AddSupport,
    SpendSupport,
}

impl ChangeKind {
    /// Stable text tag used by the tabular change log.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::AddClaim => "add_claim",
            ChangeKind::SpendClaim => "spend_claim",
            ChangeKind::UpdateClaim => "update_claim",
            ChangeKind::AddSupport => "add_support",
            ChangeKind::SpendSupport => "spend_support",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "add_claim" => Ok(ChangeKind::AddClaim),
            "spend_claim" => Ok(ChangeKind::SpendClaim),
            "update_claim" => Ok(ChangeKind::UpdateClaim),
            "add_support" => Ok(ChangeKind::AddSupport),
            "spend_support" => Ok(ChangeKind::SpendSupport),
            _ => Err(ParseError::ChangeKind { raw: s.to_string() }),
        }
    }
}

/// One event against one name at one height.
///
/// Heights are monotonically non-decreasing within a stream. A
/// `visible_height` of zero means "visible from `height`".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub name: Vec<u8>,
    pub out_point: OutPoint,
    pub claim_id: Option<ClaimId>,
    pub amount: i64,
    pub value: Vec<u8>,
    pub height: i32,
    pub visible_height: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_round_trip() {
        for kind in [
            ChangeKind::AddClaim,
            ChangeKind::SpendClaim,
            ChangeKind::UpdateClaim,
            ChangeKind::AddSupport,
            ChangeKind::SpendSupport,
        ] {
            assert_eq!(ChangeKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(ChangeKind::parse("burn_claim").is_err());
    }
}
