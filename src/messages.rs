//! Wire message shapes (§6). Encoding is the overlay's concern; this crate
//! only requires `Serialize + DeserializeOwned`.

use crate::group::GroupElement;
use crate::pvss::{DecShare, EncShare};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dealer's round-A broadcast: its encrypted share row plus the basis to
/// reconstruct its public polynomial.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AMessage {
    pub session_id: SessionId,
    pub src: u32,
    pub b: GroupElement,
    pub commits: Vec<GroupElement>,
    pub shares: Vec<EncShare>,
    pub purpose: String,
    pub time: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMsg {
    pub voted: bool,
    pub vote: i32,
}

/// A participant's vote vector over every row it has decided.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VMessage {
    pub session_id: SessionId,
    pub src: u32,
    pub votes: BTreeMap<u32, VoteMsg>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RShareEntry {
    pub row: u32,
    pub dec: DecShare,
}

/// A participant's opened column across every row it could decrypt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RMessage {
    pub session_id: SessionId,
    pub src: u32,
    pub shares: Vec<RShareEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WireMessage {
    A(AMessage),
    V(VMessage),
    R(RMessage),
}
