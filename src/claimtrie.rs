//! Single-writer facade: stages changes against per-name nodes,
//! advances blocks, and commits the winning claims into the trie.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::{
    ApplyWarning, Change, ChangeKind, Claim, ClaimId, Hash, Node, OutPoint, Status,
};
use crate::param::ChainParams;
use crate::repo::NodeBlobRepo;
use crate::trie::{MerkleTrie, TrieError, ValueStore};

/// Working set of per-name nodes.
///
/// Every name touched during a run stays materialized: the trie's value
/// store must remain a deterministic function of node state, and a
/// rehash of one name's path may need the leaf contribution of any
/// name sharing a prefix.
#[derive(Default)]
struct NodeManager {
    nodes: HashMap<Vec<u8>, Node>,
}

impl NodeManager {
    fn get(&self, name: &[u8]) -> Option<&Node> {
        self.nodes.get(name)
    }

    fn get_mut(&mut self, name: &[u8]) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    fn get_or_create(&mut self, name: &[u8]) -> &mut Node {
        self.nodes.entry(name.to_vec()).or_default()
    }
}

impl ValueStore for NodeManager {
    fn get(&self, name: &[u8]) -> Option<Hash> {
        let node = self.nodes.get(name)?;
        let best = node.best_claim()?;
        if best.status != Status::Activated {
            return None;
        }
        Some(leaf_hash(best, node.taken_over_at))
    }
}

/// Leaf contribution for a winning claim: double-SHA256 over the
/// claim's outpoint serialization and the takeover height, both
/// little-endian where multi-byte.
fn leaf_hash(winner: &Claim, taken_over_at: i32) -> Hash {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(winner.out_point.txid.as_bytes());
    buf[32..36].copy_from_slice(&winner.out_point.index.to_le_bytes());
    buf[36..].copy_from_slice(&taken_over_at.to_le_bytes());
    crate::core::double_sha256(&buf)
}

/// The claim trie: a single-writer aggregate of the node working set
/// and the Merkle prefix trie.
///
/// Changes are staged at `height() + 1`; `append_block` advances the
/// height, adjusts every affected node, and marks their trie paths
/// dirty for the next `merkle_hash`.
pub struct ClaimTrie {
    params: ChainParams,
    height: i32,
    nodes: NodeManager,
    trie: MerkleTrie,
    /// Names with changes staged for the next block.
    staged: BTreeSet<Vec<u8>>,
    /// Names whose nodes change on their own at a future height
    /// (activations and expirations).
    schedule: BTreeMap<i32, BTreeSet<Vec<u8>>>,
    /// Log-once keys for tolerated change-stream holes.
    reported: HashSet<(i32, Option<ClaimId>)>,
}

impl ClaimTrie {
    pub fn new(params: ChainParams, blob_repo: Box<dyn NodeBlobRepo>) -> Self {
        Self {
            params,
            height: 0,
            nodes: NodeManager::default(),
            trie: MerkleTrie::new(blob_repo),
            staged: BTreeSet::new(),
            schedule: BTreeMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Current state of a name, if it has ever been touched.
    pub fn node(&self, name: &[u8]) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn add_claim(&mut self, name: &[u8], out_point: OutPoint, amount: i64, value: Vec<u8>) {
        let claim_id = ClaimId::from_outpoint(&out_point);
        self.stage(Change {
            kind: ChangeKind::AddClaim,
            name: name.to_vec(),
            out_point,
            claim_id: Some(claim_id),
            amount,
            value,
            height: self.height + 1,
            visible_height: 0,
        });
    }

    pub fn update_claim(
        &mut self,
        name: &[u8],
        out_point: OutPoint,
        amount: i64,
        claim_id: ClaimId,
        value: Vec<u8>,
    ) {
        self.stage(Change {
            kind: ChangeKind::UpdateClaim,
            name: name.to_vec(),
            out_point,
            claim_id: Some(claim_id),
            amount,
            value,
            height: self.height + 1,
            visible_height: 0,
        });
    }

    pub fn spend_claim(&mut self, name: &[u8], out_point: OutPoint) {
        self.stage(Change {
            kind: ChangeKind::SpendClaim,
            name: name.to_vec(),
            out_point,
            claim_id: None,
            amount: 0,
            value: Vec::new(),
            height: self.height + 1,
            visible_height: 0,
        });
    }

    pub fn add_support(&mut self, name: &[u8], out_point: OutPoint, amount: i64, claim_id: ClaimId) {
        self.stage(Change {
            kind: ChangeKind::AddSupport,
            name: name.to_vec(),
            out_point,
            claim_id: Some(claim_id),
            amount,
            value: Vec::new(),
            height: self.height + 1,
            visible_height: 0,
        });
    }

    pub fn spend_support(&mut self, name: &[u8], out_point: OutPoint) {
        self.stage(Change {
            kind: ChangeKind::SpendSupport,
            name: name.to_vec(),
            out_point,
            claim_id: None,
            amount: 0,
            value: Vec::new(),
            height: self.height + 1,
            visible_height: 0,
        });
    }

    /// Finalize the next block: advance the height, adjust every staged
    /// or scheduled node, and mark their trie paths dirty.
    pub fn append_block(&mut self) -> Result<(), TrieError> {
        for name in self.advance_block() {
            self.trie.update(&name)?;
        }
        Ok(())
    }

    /// Advance node state for the next block without touching the trie.
    /// Returns the affected names. Used directly when fast-forwarding a
    /// resumed replay; `append_block` otherwise.
    pub fn advance_block(&mut self) -> Vec<Vec<u8>> {
        self.height += 1;
        let height = self.height;

        let mut names = std::mem::take(&mut self.staged);
        let due: Vec<i32> = self
            .schedule
            .range(..=height)
            .map(|(&h, _)| h)
            .collect();
        for h in due {
            if let Some(scheduled) = self.schedule.remove(&h) {
                names.extend(scheduled);
            }
        }

        for name in &names {
            if let Some(node) = self.nodes.get_mut(name) {
                node.adjust_to(height, height, name, &self.params);
                let next = node.next_update();
                if next != i32::MAX {
                    self.schedule.entry(next).or_default().insert(name.clone());
                }
            }
        }

        names.into_iter().collect()
    }

    /// Root hash over all (name, winning claim) pairs.
    pub fn merkle_hash(&mut self) -> Result<Hash, TrieError> {
        self.trie.merkle_hash(&self.nodes)
    }

    /// Install a previously recorded root; node state is unaffected.
    pub fn set_root(&mut self, hash: Hash) {
        self.trie.set_root(hash);
    }

    pub fn close(&mut self) -> Result<(), TrieError> {
        self.trie.close()
    }

    fn stage(&mut self, chg: Change) {
        let delay = self.delay_for_name(&chg.name, chg.height);
        let node = self.nodes.get_or_create(&chg.name);
        if let Some(warning) = node.apply_change(&chg, delay, &self.params) {
            self.report(&chg.name, warning);
        }
        self.staged.insert(chg.name);
    }

    /// Takeover delay for a change arriving at `height`: zero unless the
    /// name already has an activated winner.
    fn delay_for_name(&self, name: &[u8], height: i32) -> i32 {
        match self.nodes.get(name) {
            Some(node) if node.has_activated_winner() => {
                self.params.activation_delay(height, node.taken_over_at)
            }
            _ => 0,
        }
    }

    fn report(&mut self, name: &[u8], warning: ApplyWarning) {
        if let Some(key) = warning.dedup_key() {
            if !self.reported.insert(key) {
                return;
            }
        }
        tracing::warn!(name = %String::from_utf8_lossy(name), "{warning}");
    }
}
