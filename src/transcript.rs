//! Transcript assembly and the stateless public verifier (§4.7).

use crate::error::ProtocolError;
use crate::group::GroupElement;
use crate::poly::PubPoly;
use crate::pvss::{self, DecShare, EncShare};
use crate::session::{self, SessionId, VotingPolicy};
use crate::state::VoteEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a third party needs to re-derive and check the coin,
/// independent of any `Participant`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: SessionId,
    pub suite: &'static str,
    pub n: u32,
    pub f: u32,
    pub purpose: String,
    pub time: i64,
    pub x: Vec<GroupElement>,
    pub h: GroupElement,
    pub policy: VotingPolicy,
    pub enc_shares: BTreeMap<u32, BTreeMap<u32, EncShare>>,
    pub pub_polys: BTreeMap<u32, PubPoly>,
    pub dec_shares: BTreeMap<u32, BTreeMap<u32, DecShare>>,
    pub votes: BTreeMap<u32, VoteEntry>,
    pub secrets: BTreeMap<u32, GroupElement>,
}

impl Transcript {
    /// Canonical byte encoding, used wherever a transcript needs to cross a
    /// wire or sit in storage rather than stay an in-process value.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Transcript contains no unserializable fields")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Stateless, public verification of a `(coin_bytes, transcript)` pair
/// (§4.7). Checks every step; does not short-circuit so the caller's error
/// always names the first genuine failure encountered while still having
/// run every earlier check.
pub fn verify(coin_bytes: &[u8], transcript: &Transcript) -> Result<(), ProtocolError> {
    let recomputed_sid = session::compute_session_id(
        transcript.n,
        transcript.f,
        &transcript.x,
        &transcript.purpose,
        transcript.time,
    );
    if recomputed_sid != transcript.session_id {
        return Err(ProtocolError::VerifyFailure {
            step: "session_id",
            reason: "recomputed session id does not match transcript".into(),
        });
    }

    for (row, cols) in &transcript.enc_shares {
        let pub_poly = transcript.pub_polys.get(row).ok_or(ProtocolError::VerifyFailure {
            step: "enc_shares",
            reason: format!("row {row} has encrypted shares but no public polynomial"),
        })?;
        for (col, share) in cols {
            let recipient_pub = *transcript.x.get(*col as usize).ok_or(ProtocolError::VerifyFailure {
                step: "enc_shares",
                reason: format!("column {col} out of range"),
            })?;
            let commitment = pub_poly.eval(*col).v;
            pvss::verify_enc_share(recipient_pub, commitment, share).map_err(|source| {
                ProtocolError::VerifyFailure {
                    step: "enc_shares",
                    reason: format!("row {row} column {col}: {source}"),
                }
            })?;
        }
    }

    for (row, cols) in &transcript.dec_shares {
        let enc_row = transcript.enc_shares.get(row).ok_or(ProtocolError::VerifyFailure {
            step: "dec_shares",
            reason: format!("row {row} has decrypted shares but no encrypted shares"),
        })?;
        for (col, dec) in cols {
            let enc = enc_row.get(col).ok_or(ProtocolError::VerifyFailure {
                step: "dec_shares",
                reason: format!("row {row} column {col} has no matching encrypted share"),
            })?;
            let recipient_pub = *transcript.x.get(*col as usize).ok_or(ProtocolError::VerifyFailure {
                step: "dec_shares",
                reason: format!("column {col} out of range"),
            })?;
            pvss::verify_dec_share(recipient_pub, enc, dec).map_err(|source| {
                ProtocolError::VerifyFailure {
                    step: "dec_shares",
                    reason: format!("row {row} column {col}: {source}"),
                }
            })?;
        }
    }

    for (row, secret) in &transcript.secrets {
        let enc_row = transcript
            .enc_shares
            .get(row)
            .map(|m| m.values().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        let dec_row = transcript
            .dec_shares
            .get(row)
            .map(|m| m.values().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        let t = transcript.f + 1;
        let recovered = pvss::recover_secret(&enc_row, &dec_row, t as usize).map_err(|source| {
            ProtocolError::VerifyFailure {
                step: "secrets",
                reason: format!("row {row}: {source}"),
            }
        })?;
        if recovered != *secret {
            return Err(ProtocolError::VerifyFailure {
                step: "secrets",
                reason: format!("row {row}: recovered secret does not match transcript"),
            });
        }
    }

    let coin: GroupElement = transcript.secrets.values().copied().sum();
    if coin.to_bytes().as_ref() != coin_bytes {
        return Err(ProtocolError::VerifyFailure {
            step: "coin",
            reason: "sum of transcript secrets does not match the supplied coin bytes".into(),
        });
    }

    Ok(())
}
