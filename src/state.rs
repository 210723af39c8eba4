//! Per-session local state (§3 `LocalState`), held behind the single mutex
//! described in §5.

use crate::group::GroupElement;
use crate::poly::PubPoly;
use crate::pvss::{DecShare, EncShare};
use crate::session::SessionParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowState {
    Empty,
    Collecting,
    Complete,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct VoteEntry {
    pub voted: bool,
    pub tally: u32,
}

/// Everything a `Participant` knows about the run in progress. `params` is
/// `None` until `Setup` runs (including the implicit bootstrap Setup a
/// non-initiator performs on its first `A`).
#[derive(Default)]
pub struct ParticipantState {
    pub params: Option<SessionParams>,
    pub local: LocalState,
}

#[derive(Default)]
pub struct LocalState {
    pub row_state: BTreeMap<u32, RowState>,
    pub pub_polys: BTreeMap<u32, PubPoly>,
    pub enc_shares: BTreeMap<u32, BTreeMap<u32, EncShare>>,
    pub dec_shares: BTreeMap<u32, BTreeMap<u32, DecShare>>,
    pub votes: BTreeMap<u32, VoteEntry>,
    pub r_seen: BTreeMap<u32, bool>,
    pub self_voted: bool,
    pub r_sent: bool,
    /// Set by the driver when its collection deadline elapses (§5
    /// "Cancellation / timeout"); forces every still-`Empty` row to be
    /// treated as decided-at-zero-votes so the vote trigger can fire even
    /// when a dealer never broadcasts its `A`.
    pub collection_forced: bool,
    pub n_prime: Option<u32>,
    pub secrets: BTreeMap<u32, GroupElement>,
    pub coin: Option<GroupElement>,
}

impl LocalState {
    pub fn reset_for(n: u32) -> Self {
        let mut row_state = BTreeMap::new();
        let mut votes = BTreeMap::new();
        let mut r_seen = BTreeMap::new();
        for r in 0..n {
            row_state.insert(r, RowState::Empty);
            votes.insert(r, VoteEntry::default());
            r_seen.insert(r, false);
        }
        LocalState {
            row_state,
            pub_polys: BTreeMap::new(),
            enc_shares: BTreeMap::new(),
            dec_shares: BTreeMap::new(),
            votes,
            r_seen,
            self_voted: false,
            r_sent: false,
            collection_forced: false,
            n_prime: None,
            secrets: BTreeMap::new(),
            coin: None,
        }
    }

    pub fn row_state(&self, row: u32) -> RowState {
        self.row_state.get(&row).copied().unwrap_or(RowState::Empty)
    }

    pub fn all_rows_decided(&self, n: u32) -> bool {
        self.collection_forced || (0..n).all(|r| self.row_state(r) != RowState::Empty)
    }
}
