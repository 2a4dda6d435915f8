//! Chain parameters: activation delay, expiration spans, and the
//! historical takeover workaround table.

use std::collections::HashSet;

use thiserror::Error;

/// Consensus constants for one chain.
///
/// The takeover workaround table is external data (it encodes specific
/// historical heights of one chain); it is loaded from a file rather
/// than baked in. See [`parse_takeover_workarounds`].
#[derive(Clone, Debug)]
pub struct ChainParams {
    pub activation_delay_divisor: i32,
    pub max_activation_delay: i32,
    pub original_claim_expiration: i32,
    pub extended_claim_expiration: i32,
    pub extended_claim_expiration_fork_height: i32,
    pub max_removal_workaround_height: i32,
    pub takeover_workarounds: HashSet<(i32, Vec<u8>)>,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            activation_delay_divisor: 32,
            max_activation_delay: 4032,
            original_claim_expiration: 262_974,
            extended_claim_expiration: 2_102_400,
            extended_claim_expiration_fork_height: 400_155,
            max_removal_workaround_height: 658_300,
            takeover_workarounds: HashSet::new(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            activation_delay_divisor: 32,
            max_activation_delay: 4032,
            original_claim_expiration: 262_974,
            extended_claim_expiration: 2_102_400,
            extended_claim_expiration_fork_height: 278_160,
            max_removal_workaround_height: 100,
            takeover_workarounds: HashSet::new(),
        }
    }

    pub fn regtest() -> Self {
        Self {
            activation_delay_divisor: 32,
            max_activation_delay: 4032,
            original_claim_expiration: 500,
            extended_claim_expiration: 600,
            extended_claim_expiration_fork_height: 800,
            max_removal_workaround_height: 200,
            takeover_workarounds: HashSet::new(),
        }
    }

    /// Expiration span for a claim accepted at `accepted_at`. Claims
    /// whose original expiration lands past the fork height get the
    /// extended span.
    pub fn expiration_for(&self, accepted_at: i32) -> i32 {
        if accepted_at + self.original_claim_expiration
            > self.extended_claim_expiration_fork_height
        {
            self.extended_claim_expiration
        } else {
            self.original_claim_expiration
        }
    }

    /// Takeover delay for a name whose winner last changed at
    /// `taken_over_at`, evaluated at `height`.
    pub fn activation_delay(&self, height: i32, taken_over_at: i32) -> i32 {
        ((height - taken_over_at) / self.activation_delay_divisor)
            .clamp(0, self.max_activation_delay)
    }

    pub fn is_takeover_workaround(&self, height: i32, name: &[u8]) -> bool {
        self.takeover_workarounds
            .contains(&(height, name.to_vec()))
    }
}

#[derive(Debug, Error)]
pub enum WorkaroundsParseError {
    #[error("workarounds line {line} is malformed: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Parse a takeover-workarounds table: one `height,name` entry per line,
/// `#`-prefixed comment lines and blank lines skipped.
pub fn parse_takeover_workarounds(
    text: &str,
) -> Result<HashSet<(i32, Vec<u8>)>, WorkaroundsParseError> {
    let mut entries = HashSet::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((height_raw, name)) = line.split_once(',') else {
            return Err(WorkaroundsParseError::Malformed {
                line: i + 1,
                reason: "missing ',' separator".into(),
            });
        };
        let height =
            height_raw
                .trim()
                .parse::<i32>()
                .map_err(|_| WorkaroundsParseError::Malformed {
                    line: i + 1,
                    reason: format!("height `{}` is not an i32", height_raw.trim()),
                })?;
        entries.insert((height, name.as_bytes().to_vec()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_span_crosses_fork() {
        let params = ChainParams::mainnet();
        // Expires well before the fork: original span.
        assert_eq!(params.expiration_for(1), params.original_claim_expiration);
        // Original expiration would land past the fork: extended span.
        assert_eq!(
            params.expiration_for(200_000),
            params.extended_claim_expiration
        );
    }

    #[test]
    fn activation_delay_is_clamped() {
        let params = ChainParams::mainnet();
        assert_eq!(params.activation_delay(100, 100), 0);
        assert_eq!(params.activation_delay(164, 100), 2);
        assert_eq!(
            params.activation_delay(1_000_000, 0),
            params.max_activation_delay
        );
    }

    #[test]
    fn workarounds_parse() {
        let table = parse_takeover_workarounds("# comment\n100,foo\n 250 ,bar\n\n").unwrap();
        assert!(table.contains(&(100, b"foo".to_vec())));
        assert!(table.contains(&(250, b"bar".to_vec())));
        assert_eq!(table.len(), 2);

        assert!(parse_takeover_workarounds("nonsense").is_err());
        assert!(parse_takeover_workarounds("x,foo").is_err());
    }

    #[test]
    fn workaround_lookup_matches_height_and_name() {
        let mut params = ChainParams::regtest();
        params.takeover_workarounds.insert((10, b"w".to_vec()));
        assert!(params.is_takeover_workaround(10, b"w"));
        assert!(!params.is_takeover_workaround(11, b"w"));
        assert!(!params.is_takeover_workaround(10, b"x"));
    }
}
