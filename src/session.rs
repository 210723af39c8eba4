//! Session parameters, `SessionID` derivation and the second base `H`
//! (§3, §4.1).

use crate::error::ProtocolError;
use crate::group::GroupElement;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type SessionId = [u8; 32];

/// Resolution of the "voting termination" open question (§9): `Strict`
/// requires every one of the `n` peers to vote before Opening begins and
/// is the default; `Quorum` fires as soon as `2f+1` peers have voted,
/// scoring the remainder 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingPolicy {
    Strict,
    Quorum,
}

impl Default for VotingPolicy {
    fn default() -> Self {
        VotingPolicy::Strict
    }
}

/// Identifies the group and hash this session runs over. A single fixed
/// value today (Ristretto255 + Blake2b), kept as an explicit tag in the
/// transcript so a future suite change is a visible, checkable fact rather
/// than an implicit assumption.
pub const SUITE: &str = "ristretto255-blake2b";

/// Immutable-after-`Setup` parameters for one protocol run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionParams {
    pub n: u32,
    pub f: u32,
    pub t: u32,
    pub purpose: String,
    pub time: i64,
    pub x: Vec<GroupElement>,
    pub suite: &'static str,
    pub policy: VotingPolicy,
    pub session_id: SessionId,
    pub h: GroupElement,
}

impl SessionParams {
    pub fn new(
        n: u32,
        f: u32,
        purpose: String,
        time: i64,
        x: Vec<GroupElement>,
        policy: VotingPolicy,
    ) -> Result<Self, ProtocolError> {
        if n == 0 || 3 * f >= n {
            return Err(ProtocolError::BadParameters { n, f });
        }
        if x.len() as u32 != n {
            return Err(ProtocolError::BadParameters { n, f });
        }
        let session_id = compute_session_id(n, f, &x, &purpose, time);
        let h = derive_h(&session_id);
        Ok(SessionParams {
            n,
            f,
            t: f + 1,
            purpose,
            time,
            x,
            suite: SUITE,
            policy,
            session_id,
            h,
        })
    }
}

/// `H_SID = Hash(n ‖ f ‖ X[0] ‖ … ‖ X[n-1] ‖ purpose ‖ time)`, integers
/// little-endian 32-bit (`time` is a little-endian `i64`).
pub fn compute_session_id(
    n: u32,
    f: u32,
    x: &[GroupElement],
    purpose: &str,
    time: i64,
) -> SessionId {
    let mut hasher = Sha256::new();
    hasher.update(n.to_le_bytes());
    hasher.update(f.to_le_bytes());
    for xi in x {
        hasher.update(xi.to_bytes());
    }
    hasher.update(purpose.as_bytes());
    hasher.update(time.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derives the session's second base `H` from `H_SID` by hash-to-curve.
pub fn derive_h(session_id: &SessionId) -> GroupElement {
    GroupElement::from_hash(session_id)
}
