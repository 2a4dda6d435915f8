//! Per-name node state machine: applies changes, advances through
//! heights, and elects the best claim under the takeover rules.

use thiserror::Error;

use crate::param::ChainParams;

use super::change::{Change, ChangeKind};
use super::claim::{Claim, Status};
use super::outpoint::{ClaimId, OutPoint};

/// Reportable, non-fatal outcome of applying a change. Holes in
/// historical change streams are tolerated; the caller decides how to
/// log these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplyWarning {
    #[error("claim at height {height} conflicts with existing txo {out_point}")]
    ConflictingOutPoint { height: i32, out_point: OutPoint },
    #[error("spending claim at height {height} but no claim matches txo {out_point}")]
    MissingClaim {
        height: i32,
        out_point: OutPoint,
        claim_id: Option<ClaimId>,
    },
    #[error("spending support at height {height} but no support matches txo {out_point}")]
    MissingSupport {
        height: i32,
        out_point: OutPoint,
        claim_id: Option<ClaimId>,
    },
    #[error("updating claim at height {height} but no spent claim matches id {claim_id}")]
    MissingUpdateTarget { height: i32, claim_id: ClaimId },
}

impl ApplyWarning {
    /// Key for log-once deduplication; `None` means always report.
    pub fn dedup_key(&self) -> Option<(i32, Option<ClaimId>)> {
        match self {
            ApplyWarning::ConflictingOutPoint { .. } => None,
            ApplyWarning::MissingClaim {
                height, claim_id, ..
            }
            | ApplyWarning::MissingSupport {
                height, claim_id, ..
            } => Some((*height, *claim_id)),
            ApplyWarning::MissingUpdateTarget { height, claim_id } => {
                Some((*height, Some(*claim_id)))
            }
        }
    }
}

/// All state held for one name.
///
/// The winner is tracked by its outpoint so it survives re-ordering of
/// the claim list; [`Node::best_claim`] resolves it against the live
/// list, which means a spend staged in the current batch immediately
/// demotes the winner.
#[derive(Clone, Debug, Default)]
pub struct Node {
    pub claims: Vec<Claim>,
    pub supports: Vec<Claim>,
    best_out: Option<OutPoint>,
    /// Height at which the current best claim took over.
    pub taken_over_at: i32,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one change. `delay` is the activation delay the caller
    /// computed for this name at the change's height.
    pub fn apply_change(
        &mut self,
        chg: &Change,
        delay: i32,
        params: &ChainParams,
    ) -> Option<ApplyWarning> {
        let visible_at = if chg.visible_height > 0 {
            chg.visible_height
        } else {
            chg.height
        };

        match chg.kind {
            ChangeKind::AddClaim => {
                let conflict = self.claims.iter().any(|c| c.out_point == chg.out_point);
                self.claims.push(Claim {
                    out_point: chg.out_point,
                    claim_id: chg
                        .claim_id
                        .unwrap_or_else(|| ClaimId::from_outpoint(&chg.out_point)),
                    amount: chg.amount,
                    value: chg.value.clone(),
                    accepted_at: chg.height,
                    active_at: chg.height + delay,
                    visible_at,
                    expires_at: chg.height + params.expiration_for(chg.height),
                    status: Status::Accepted,
                });
                conflict.then_some(ApplyWarning::ConflictingOutPoint {
                    height: chg.height,
                    out_point: chg.out_point,
                })
            }

            ChangeKind::SpendClaim => {
                match self
                    .claims
                    .iter_mut()
                    .find(|c| c.out_point == chg.out_point)
                {
                    Some(c) => {
                        c.status = Status::Deactivated;
                        None
                    }
                    // Absence is legitimate in historical data.
                    None => Some(ApplyWarning::MissingClaim {
                        height: chg.height,
                        out_point: chg.out_point,
                        claim_id: chg.claim_id,
                    }),
                }
            }

            ChangeKind::UpdateClaim => {
                // Only a claim spent earlier in the same batch qualifies;
                // the preserved id is the cross-transaction identity.
                let claim_id = chg.claim_id.unwrap_or_default();
                match self
                    .claims
                    .iter_mut()
                    .find(|c| c.claim_id == claim_id && c.status == Status::Deactivated)
                {
                    Some(c) => {
                        c.out_point = chg.out_point;
                        c.amount = chg.amount;
                        c.value = chg.value.clone();
                        c.status = Status::Accepted;
                        // Historical behavior: the update resets acceptance,
                        // making the claim newer than it is. Recorded root
                        // hashes depend on this.
                        c.accepted_at = chg.height;
                        c.active_at = chg.height + delay;
                        c.expires_at = chg.height + params.expiration_for(chg.height);
                        None
                    }
                    None => Some(ApplyWarning::MissingUpdateTarget {
                        height: chg.height,
                        claim_id,
                    }),
                }
            }

            ChangeKind::AddSupport => {
                self.supports.push(Claim {
                    out_point: chg.out_point,
                    claim_id: chg.claim_id.unwrap_or_default(),
                    amount: chg.amount,
                    value: chg.value.clone(),
                    accepted_at: chg.height,
                    active_at: chg.height + delay,
                    visible_at,
                    expires_at: chg.height + params.expiration_for(chg.height),
                    status: Status::Accepted,
                });
                None
            }

            ChangeKind::SpendSupport => {
                match self
                    .supports
                    .iter_mut()
                    .find(|s| s.out_point == chg.out_point)
                {
                    Some(s) => {
                        s.status = Status::Deactivated;
                        None
                    }
                    None => Some(ApplyWarning::MissingSupport {
                        height: chg.height,
                        out_point: chg.out_point,
                        claim_id: chg.claim_id,
                    }),
                }
            }
        }
    }

    /// Advance the node to `height`, then keep advancing through each
    /// subsequent [`Node::next_update`] height up to `max_height`.
    pub fn adjust_to(&mut self, height: i32, max_height: i32, name: &[u8], params: &ChainParams) {
        let changed = self.handle_expired_and_activated(height) > 0;
        self.update_takeover_height(height, name, changed, params);
        if max_height > height {
            let mut h = self.next_update();
            while h <= max_height {
                let changed = self.handle_expired_and_activated(h) > 0;
                self.update_takeover_height(h, name, changed, params);
                h = self.next_update();
            }
        }
    }

    /// Smallest future height at which this node's state changes on its
    /// own: an expiration, or an accepted entry becoming both active and
    /// visible. `i32::MAX` when nothing is scheduled.
    pub fn next_update(&self) -> i32 {
        let mut next = i32::MAX;
        for entry in self.claims.iter().chain(self.supports.iter()) {
            next = next.min(entry.expires_at);
            if entry.status == Status::Accepted {
                next = next.min(entry.active_at.max(entry.visible_at));
            }
        }
        next
    }

    /// The activated claim with maximal effective amount; ties go to the
    /// earlier accepted_at, then the smaller outpoint.
    pub fn find_best_claim(&self) -> Option<&Claim> {
        self.find_best_index().map(|i| &self.claims[i])
    }

    /// The tracked winner, resolved against the live claim list.
    pub fn best_claim(&self) -> Option<&Claim> {
        self.best_index().map(|i| &self.claims[i])
    }

    pub fn has_activated_winner(&self) -> bool {
        self.best_claim()
            .is_some_and(|c| c.status == Status::Activated)
    }

    /// The claim's own amount plus all activated supports carrying its id.
    pub fn effective_amount(&self, claim: &Claim) -> i64 {
        effective_amount(claim, &self.supports)
    }

    /// Order claims for presentation: effective amount descending, then
    /// accepted_at newest first, then outpoint. Not used for winner
    /// selection.
    pub fn sort_claims(&mut self) {
        let supports = std::mem::take(&mut self.supports);
        let mut keyed: Vec<(i64, Claim)> = std::mem::take(&mut self.claims)
            .into_iter()
            .map(|c| (effective_amount(&c, &supports), c))
            .collect();
        keyed.sort_by(|(amount_a, a), (amount_b, b)| {
            amount_b
                .cmp(amount_a)
                .then(b.accepted_at.cmp(&a.accepted_at))
                .then(a.out_point.cmp(&b.out_point))
        });
        self.claims = keyed.into_iter().map(|(_, c)| c).collect();
        self.supports = supports;
    }

    fn best_index(&self) -> Option<usize> {
        let target = self.best_out?;
        self.claims.iter().position(|c| c.out_point == target)
    }

    fn find_best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, i64)> = None;
        for (i, candidate) in self.claims.iter().enumerate() {
            if candidate.status != Status::Activated {
                continue;
            }
            let amount = self.effective_amount(candidate);
            best = match best {
                None => Some((i, amount)),
                Some((incumbent_i, incumbent_amount)) => {
                    let incumbent = &self.claims[incumbent_i];
                    let wins = amount > incumbent_amount
                        || (amount == incumbent_amount
                            && (candidate.accepted_at < incumbent.accepted_at
                                || (candidate.accepted_at == incumbent.accepted_at
                                    && candidate.out_point < incumbent.out_point)));
                    if wins {
                        Some((i, amount))
                    } else {
                        Some((incumbent_i, incumbent_amount))
                    }
                }
            };
        }
        best.map(|(i, _)| i)
    }

    /// Promote accepted entries that are due, drop deactivated and
    /// expired ones. Returns how many entries changed class.
    fn handle_expired_and_activated(&mut self, height: i32) -> usize {
        fn sweep(items: &mut Vec<Claim>, height: i32) -> usize {
            let mut changes = 0;
            for entry in items.iter_mut() {
                if entry.status == Status::Accepted
                    && entry.active_at <= height
                    && entry.visible_at <= height
                {
                    entry.status = Status::Activated;
                    changes += 1;
                }
            }
            let before = items.len();
            items.retain(|entry| entry.expires_at > height && entry.status != Status::Deactivated);
            changes + (before - items.len())
        }
        sweep(&mut self.claims, height) + sweep(&mut self.supports, height)
    }

    fn update_takeover_height(
        &mut self,
        height: i32,
        name: &[u8],
        refind_best: bool,
        params: &ChainParams,
    ) {
        let mut candidate = if refind_best {
            self.find_best_index()
        } else {
            self.best_index()
        };

        let candidate_id = candidate.map(|i| self.claims[i].claim_id);
        let winner_id = self
            .best_claim()
            .filter(|c| c.status == Status::Activated)
            .map(|c| c.claim_id);
        let mut taking_over = match (candidate_id, winner_id) {
            (Some(candidate_id), Some(winner_id)) => candidate_id != winner_id,
            _ => true,
        };

        if taking_over
            && height < params.max_removal_workaround_height
            && self.activate_all_claims(height) > 0
        {
            candidate = self.find_best_index();
        }

        if !taking_over && height < params.max_removal_workaround_height {
            // Historical consensus workaround: certain (height, name)
            // pairs recorded a takeover even though the winner held.
            taking_over = params.is_takeover_workaround(height, name);
        }

        if taking_over {
            self.taken_over_at = height;
            self.best_out = candidate.map(|i| self.claims[i].out_point);
        }
    }

    /// Force-activate every accepted, visible entry that has not reached
    /// its activation height yet. Returns how many were activated.
    fn activate_all_claims(&mut self, height: i32) -> usize {
        let mut count = 0;
        for entry in self.claims.iter_mut().chain(self.supports.iter_mut()) {
            if entry.status == Status::Accepted
                && entry.active_at > height
                && entry.visible_at <= height
            {
                entry.active_at = height;
                entry.status = Status::Activated;
                count += 1;
            }
        }
        count
    }
}

fn effective_amount(claim: &Claim, supports: &[Claim]) -> i64 {
    let mut total = claim.amount;
    for support in supports {
        if support.status == Status::Activated && support.claim_id == claim.claim_id {
            total += support.amount;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Hash;

    const NAME: &[u8] = b"n";

    fn params() -> ChainParams {
        ChainParams::regtest()
    }

    fn outpoint(byte: u8, index: u32) -> OutPoint {
        OutPoint::new(Hash::from_bytes([byte; 32]), index)
    }

    fn claim_id(byte: u8) -> ClaimId {
        ClaimId::from_bytes([byte; 20])
    }

    fn change(kind: ChangeKind, out_point: OutPoint, height: i32, amount: i64) -> Change {
        Change {
            kind,
            name: NAME.to_vec(),
            out_point,
            claim_id: None,
            amount,
            value: Vec::new(),
            height,
            visible_height: 0,
        }
    }

    fn add_claim(node: &mut Node, out_point: OutPoint, id: ClaimId, height: i32, amount: i64) {
        let mut chg = change(ChangeKind::AddClaim, out_point, height, amount);
        chg.claim_id = Some(id);
        assert_eq!(node.apply_change(&chg, 0, &params()), None);
    }

    #[test]
    fn first_claim_activates_and_takes_over() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(2), 1, 100);
        node.adjust_to(1, 1, NAME, &params());

        let best = node.best_claim().expect("winner");
        assert_eq!(best.status, Status::Activated);
        assert_eq!(best.accepted_at, 1);
        assert_eq!(node.taken_over_at, 1);
    }

    #[test]
    fn delayed_challenger_waits_for_activation_height() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 50);
        node.adjust_to(1, 1, NAME, &params());

        // Challenger with more stake arrives at height 40 with delay 2.
        let mut chg = change(ChangeKind::AddClaim, outpoint(2, 0), 40, 500);
        chg.claim_id = Some(claim_id(2));
        // Delay applies because the name already has an activated winner,
        // so the force-activation path stays quiet.
        assert_eq!(node.apply_change(&chg, 2, &params()), None);

        node.adjust_to(40, 40, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
        node.adjust_to(41, 41, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));

        node.adjust_to(42, 42, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(2));
        assert_eq!(node.taken_over_at, 42);
    }

    #[test]
    fn adjust_to_hops_through_scheduled_updates() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 50);
        node.adjust_to(1, 1, NAME, &params());

        let mut chg = change(ChangeKind::AddClaim, outpoint(2, 0), 10, 500);
        chg.claim_id = Some(claim_id(2));
        node.apply_change(&chg, 5, &params());

        // One call spanning the activation height must record the
        // takeover at the scheduled height, not at max_height.
        node.adjust_to(10, 30, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(2));
        assert_eq!(node.taken_over_at, 15);
    }

    #[test]
    fn support_boost_reverses_winner() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 50);
        node.adjust_to(1, 1, NAME, &params());
        add_claim(&mut node, outpoint(2, 0), claim_id(2), 2, 60);
        node.adjust_to(2, 2, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(2));

        let mut sup = change(ChangeKind::AddSupport, outpoint(3, 0), 3, 100);
        sup.claim_id = Some(claim_id(1));
        node.apply_change(&sup, 0, &params());
        node.adjust_to(3, 3, NAME, &params());

        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
        assert_eq!(node.taken_over_at, 3);
        let winner = node.best_claim().unwrap().clone();
        assert_eq!(node.effective_amount(&winner), 150);
    }

    #[test]
    fn spend_then_update_preserves_claim_id() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(9), 1, 100);
        node.adjust_to(1, 1, NAME, &params());

        let mut spend = change(ChangeKind::SpendClaim, outpoint(1, 0), 5, 0);
        spend.claim_id = Some(claim_id(9));
        assert_eq!(node.apply_change(&spend, 0, &params()), None);

        let mut update = change(ChangeKind::UpdateClaim, outpoint(7, 0), 5, 120);
        update.claim_id = Some(claim_id(9));
        assert_eq!(node.apply_change(&update, 2, &params()), None);

        assert_eq!(node.claims.len(), 1);
        let claim = &node.claims[0];
        assert_eq!(claim.claim_id, claim_id(9));
        assert_eq!(claim.out_point, outpoint(7, 0));
        assert_eq!(claim.status, Status::Accepted);
        assert_eq!(claim.accepted_at, 5);
        assert_eq!(claim.active_at, 7);
    }

    #[test]
    fn update_without_prior_spend_warns() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(9), 1, 100);

        let mut update = change(ChangeKind::UpdateClaim, outpoint(7, 0), 5, 120);
        update.claim_id = Some(claim_id(9));
        let warning = node.apply_change(&update, 0, &params());
        assert_eq!(
            warning,
            Some(ApplyWarning::MissingUpdateTarget {
                height: 5,
                claim_id: claim_id(9),
            })
        );
        // The live claim is untouched.
        assert_eq!(node.claims[0].out_point, outpoint(1, 0));
    }

    #[test]
    fn missing_spend_targets_warn_with_dedup_key() {
        let mut node = Node::new();
        let spend = change(ChangeKind::SpendClaim, outpoint(1, 0), 5, 0);
        let warning = node.apply_change(&spend, 0, &params()).expect("warning");
        assert_eq!(warning.dedup_key(), Some((5, None)));

        let spend_support = change(ChangeKind::SpendSupport, outpoint(1, 0), 6, 0);
        let warning = node
            .apply_change(&spend_support, 0, &params())
            .expect("warning");
        assert!(matches!(warning, ApplyWarning::MissingSupport { .. }));
    }

    #[test]
    fn duplicate_outpoint_add_warns_but_appends() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 100);
        let chg = change(ChangeKind::AddClaim, outpoint(1, 0), 2, 10);
        let warning = node.apply_change(&chg, 0, &params());
        assert!(matches!(
            warning,
            Some(ApplyWarning::ConflictingOutPoint { height: 2, .. })
        ));
        assert_eq!(node.claims.len(), 2);
    }

    #[test]
    fn equal_stake_ties_break_on_smaller_outpoint() {
        for flipped in [false, true] {
            let mut node = Node::new();
            let (first, second) = if flipped {
                (outpoint(2, 0), outpoint(1, 0))
            } else {
                (outpoint(1, 0), outpoint(2, 0))
            };
            add_claim(&mut node, first, claim_id(1), 1, 100);
            add_claim(&mut node, second, claim_id(2), 1, 100);
            node.adjust_to(1, 1, NAME, &params());
            assert_eq!(node.best_claim().unwrap().out_point, outpoint(1, 0));
        }
    }

    #[test]
    fn equal_stake_ties_break_on_earlier_acceptance() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(5, 0), claim_id(1), 1, 100);
        node.adjust_to(1, 1, NAME, &params());
        add_claim(&mut node, outpoint(1, 0), claim_id(2), 2, 100);
        node.adjust_to(2, 2, NAME, &params());
        // Equal effective amounts: the earlier claim holds even though
        // the newcomer has the smaller outpoint.
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
    }

    #[test]
    fn expired_entries_are_swept() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 10, 100);
        let mut sup = change(ChangeKind::AddSupport, outpoint(2, 0), 10, 50);
        sup.claim_id = Some(claim_id(1));
        node.apply_change(&sup, 0, &params());
        node.adjust_to(10, 10, NAME, &params());
        assert!(node.has_activated_winner());

        // regtest expiration span is 500.
        node.adjust_to(510, 510, NAME, &params());
        assert!(node.claims.is_empty());
        assert!(node.supports.is_empty());
        assert!(node.best_claim().is_none());
        assert_eq!(node.next_update(), i32::MAX);
    }

    #[test]
    fn takeover_workaround_forces_takeover_height() {
        let mut p = params();
        p.takeover_workarounds.insert((20, NAME.to_vec()));

        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 100);
        node.adjust_to(1, 1, NAME, &p);
        assert_eq!(node.taken_over_at, 1);

        node.adjust_to(20, 20, NAME, &p);
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
        assert_eq!(node.taken_over_at, 20);

        // Outside the workaround window nothing moves.
        node.adjust_to(21, 21, NAME, &p);
        assert_eq!(node.taken_over_at, 20);
    }

    #[test]
    fn takeover_force_activates_pending_entries() {
        let mut node = Node::new();
        let mut chg = change(ChangeKind::AddClaim, outpoint(1, 0), 10, 100);
        chg.claim_id = Some(claim_id(1));
        node.apply_change(&chg, 3, &params());

        // No current winner, so the takeover pulls the pending claim
        // active immediately (height 10 is inside the workaround window).
        node.adjust_to(10, 10, NAME, &params());
        let best = node.best_claim().expect("winner");
        assert_eq!(best.status, Status::Activated);
        assert_eq!(best.active_at, 10);
        assert_eq!(node.taken_over_at, 10);
    }

    #[test]
    fn force_activation_gated_past_workaround_height() {
        // regtest max_removal_workaround_height is 200.
        let mut node = Node::new();
        let mut chg = change(ChangeKind::AddClaim, outpoint(1, 0), 250, 100);
        chg.claim_id = Some(claim_id(1));
        node.apply_change(&chg, 3, &params());

        node.adjust_to(250, 250, NAME, &params());
        assert!(node.best_claim().is_none());
        assert_eq!(node.claims[0].status, Status::Accepted);

        node.adjust_to(253, 253, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
        assert_eq!(node.taken_over_at, 253);
    }

    #[test]
    fn invisible_entries_do_not_activate() {
        let mut node = Node::new();
        let mut chg = change(ChangeKind::AddClaim, outpoint(1, 0), 5, 100);
        chg.claim_id = Some(claim_id(1));
        chg.visible_height = 8;
        node.apply_change(&chg, 0, &params());

        node.adjust_to(5, 5, NAME, &params());
        assert!(node.best_claim().is_none());
        assert_eq!(node.next_update(), 8);

        node.adjust_to(8, 8, NAME, &params());
        assert_eq!(node.best_claim().unwrap().claim_id, claim_id(1));
    }

    #[test]
    fn next_update_tracks_nearest_event() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(1, 0), claim_id(1), 1, 100);
        node.adjust_to(1, 1, NAME, &params());

        // Accepted challenger with delay: next event is its activation.
        let mut chg = change(ChangeKind::AddClaim, outpoint(2, 0), 10, 50);
        chg.claim_id = Some(claim_id(2));
        node.apply_change(&chg, 7, &params());
        assert_eq!(node.next_update(), 17);

        node.adjust_to(10, 10, NAME, &params());
        assert_eq!(node.next_update(), 17);

        // Once everything is active only expirations remain.
        node.adjust_to(17, 17, NAME, &params());
        assert_eq!(node.next_update(), 501);
    }

    #[test]
    fn sort_claims_orders_for_presentation() {
        let mut node = Node::new();
        add_claim(&mut node, outpoint(3, 0), claim_id(1), 1, 50);
        add_claim(&mut node, outpoint(2, 0), claim_id(2), 2, 80);
        add_claim(&mut node, outpoint(1, 0), claim_id(3), 3, 80);
        node.adjust_to(3, 3, NAME, &params());

        node.sort_claims();
        // Amount descending; equal amounts newest-first.
        assert_eq!(node.claims[0].claim_id, claim_id(3));
        assert_eq!(node.claims[1].claim_id, claim_id(2));
        assert_eq!(node.claims[2].claim_id, claim_id(1));
    }
}
