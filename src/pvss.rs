//! Publicly-verifiable secret sharing: the primitive the protocol layer in
//! [`crate::participant`] treats as an external collaborator (see
//! SPEC_FULL.md §4.8). No crate on crates.io exposes exactly this contract,
//! so it is implemented here directly, grounded in the classic
//! Schoenmakers/Stadler PVSS construction the original
//! `gopkg.in/dedis/crypto.v0/share/pvss` package (referenced, never
//! vendored, by the Go source this system is distilled from) implements:
//! each share is an additive-ElGamal encryption, under the recipient's
//! public key, of the recipient's Feldman-committed share, accompanied by a
//! non-interactive Chaum-Pedersen DLEQ proof so that *any* third party —
//! not just the recipient — can check the encrypted share is well formed.
//!
//! Nothing in this module is aware of dealers, rows, votes or sessions;
//! `participant.rs` is the only caller.

use crate::group::{GroupElement, Scalar};
use crate::poly::{self, PriPoly, PubPoly, PubShare};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PvssError {
    #[error("encrypted share at column {0} failed DLEQ verification")]
    InvalidEncShare(u32),
    #[error("decrypted share at column {0} failed DLEQ verification")]
    InvalidDecShare(u32),
    #[error("not enough valid shares to recover the secret: have {have}, need {need}")]
    NotEnoughShares { have: usize, need: usize },
    #[error("mismatched share columns between encrypted and decrypted shares")]
    MismatchedColumns,
}

/// Non-interactive Chaum-Pedersen proof that the same scalar exponent
/// relates `(base1, point1)` and `(base2, point2)`: `point1 = base1 * x`,
/// `point2 = base2 * x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleqProof {
    challenge: Scalar,
    response: Scalar,
}

impl DleqProof {
    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        base1: GroupElement,
        base2: GroupElement,
        point1: GroupElement,
        point2: GroupElement,
        exponent: Scalar,
    ) -> Self {
        let w = Scalar::random(rng);
        let a1 = base1 * w;
        let a2 = base2 * w;
        let challenge = fiat_shamir(base1, base2, point1, point2, a1, a2);
        let response = w - challenge * exponent;
        DleqProof {
            challenge,
            response,
        }
    }

    fn verify(
        &self,
        base1: GroupElement,
        base2: GroupElement,
        point1: GroupElement,
        point2: GroupElement,
    ) -> bool {
        let a1 = base1 * self.response + point1 * self.challenge;
        let a2 = base2 * self.response + point2 * self.challenge;
        let recomputed = fiat_shamir(base1, base2, point1, point2, a1, a2);
        recomputed == self.challenge
    }
}

fn fiat_shamir(
    base1: GroupElement,
    base2: GroupElement,
    point1: GroupElement,
    point2: GroupElement,
    a1: GroupElement,
    a2: GroupElement,
) -> Scalar {
    let mut buf = Vec::with_capacity(6 * GroupElement::BYTE_LEN);
    for g in [base1, base2, point1, point2, a1, a2] {
        buf.extend_from_slice(&g.to_bytes());
    }
    Scalar::from_hash(&buf)
}

/// An encrypted share of a dealer's row, addressed to recipient column `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncShare {
    pub i: u32,
    /// Ephemeral ElGamal key `K = G * r`.
    k: GroupElement,
    /// Masked commitment `C = commitment_i + X_i * r`.
    c: GroupElement,
    proof: DleqProof,
}

/// A recipient's decryption of its own column, publicly re-verifiable
/// without the recipient's private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecShare {
    pub i: u32,
    /// The recovered plaintext, equal to `commitment_i` when correct.
    pub v: GroupElement,
    proof: DleqProof,
}

/// Generates a dealer's encrypted share row plus the public polynomial
/// committing to the shared secret. `secret` pins the free coefficient
/// (`s_me`); `None` samples a fresh random secret. `h` is the session's
/// second base, binding the commitment polynomial to this run.
pub fn encrypt_shares<R: RngCore + CryptoRng>(
    rng: &mut R,
    h: GroupElement,
    recipients: &[GroupElement],
    secret: Option<Scalar>,
    threshold: usize,
) -> (Vec<EncShare>, PubPoly) {
    let poly = PriPoly::new(threshold, secret, rng);
    let pub_poly = poly.commit(h);
    let generator = GroupElement::generator();

    let shares = recipients
        .iter()
        .enumerate()
        .map(|(idx, recipient_pub)| {
            let i = idx as u32;
            let share = poly.eval(i);
            let commitment = pub_poly.eval(i).v;

            let r = Scalar::random(rng);
            let k = generator * r;
            let shared = *recipient_pub * r;
            let c = commitment + shared;

            let proof = DleqProof::prove(rng, generator, *recipient_pub, k, shared, r);

            EncShare { i, k, c, proof }
        })
        .collect();

    (shares, pub_poly)
}

/// Verifies that `share` is a correctly formed encryption, under
/// `recipient_pub`, of the value committed to at column `share.i` by the
/// dealer's public polynomial (`commitment = pub_poly.eval(share.i).v`).
pub fn verify_enc_share(
    recipient_pub: GroupElement,
    commitment: GroupElement,
    share: &EncShare,
) -> Result<(), PvssError> {
    let generator = GroupElement::generator();
    let shared = share.c - commitment;
    if share
        .proof
        .verify(generator, recipient_pub, share.k, shared)
    {
        Ok(())
    } else {
        Err(PvssError::InvalidEncShare(share.i))
    }
}

/// Recipient-side decryption of its own column. `private_key` is the
/// recipient's secret scalar for `recipient_pub = G * private_key`.
pub fn decrypt_share<R: RngCore + CryptoRng>(
    rng: &mut R,
    recipient_pub: GroupElement,
    private_key: Scalar,
    share: &EncShare,
) -> DecShare {
    let shared = share.k * private_key;
    let v = share.c - shared;
    let generator = GroupElement::generator();
    let proof = DleqProof::prove(rng, generator, share.k, recipient_pub, shared, private_key);
    DecShare {
        i: share.i,
        v,
        proof,
    }
}

/// Verifies a [`DecShare`] against the [`EncShare`] it decrypts, without
/// needing the recipient's private key.
pub fn verify_dec_share(
    recipient_pub: GroupElement,
    enc_share: &EncShare,
    dec_share: &DecShare,
) -> Result<(), PvssError> {
    if enc_share.i != dec_share.i {
        return Err(PvssError::MismatchedColumns);
    }
    let generator = GroupElement::generator();
    let shared = enc_share.c - dec_share.v;
    if dec_share
        .proof
        .verify(generator, enc_share.k, recipient_pub, shared)
    {
        Ok(())
    } else {
        Err(PvssError::InvalidDecShare(dec_share.i))
    }
}

/// Recovers the dealer's committed secret (`H * s`, a [`GroupElement`], not
/// the scalar `s` itself — this is what makes the scheme *publicly*
/// verifiable while still hiding `s` from everyone including the
/// reconstructing party) from any `threshold` verified
/// `(EncShare, DecShare)` pairs.
pub fn recover_secret(
    enc_shares: &[EncShare],
    dec_shares: &[DecShare],
    threshold: usize,
) -> Result<GroupElement, PvssError> {
    if dec_shares.len() < threshold {
        return Err(PvssError::NotEnoughShares {
            have: dec_shares.len(),
            need: threshold,
        });
    }
    for dec in dec_shares.iter().take(threshold) {
        if !enc_shares.iter().any(|e| e.i == dec.i) {
            return Err(PvssError::MismatchedColumns);
        }
    }
    let shares: Vec<PubShare> = dec_shares
        .iter()
        .take(threshold)
        .map(|d| PubShare { i: d.i, v: d.v })
        .collect();
    poly::recover_commit(&shares, threshold).ok_or(PvssError::NotEnoughShares {
        have: shares.len(),
        need: threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn keypair<R: RngCore + CryptoRng>(rng: &mut R) -> (Scalar, GroupElement) {
        let sk = Scalar::random(rng);
        (sk, GroupElement::generator() * sk)
    }

    #[test]
    fn full_round_trip_recovers_committed_secret() {
        let mut rng = ChaCha20Rng::from_seed([11u8; 32]);
        let n = 5usize;
        let t = 3usize;
        let h = GroupElement::from_hash(b"test-session");

        let keys: Vec<(Scalar, GroupElement)> = (0..n).map(|_| keypair(&mut rng)).collect();
        let pubkeys: Vec<GroupElement> = keys.iter().map(|(_, pk)| *pk).collect();

        let secret = Scalar::random(&mut rng);
        let (enc_shares, pub_poly) = encrypt_shares(&mut rng, h, &pubkeys, Some(secret), t);

        for (i, share) in enc_shares.iter().enumerate() {
            let commitment = pub_poly.eval(i as u32).v;
            verify_enc_share(pubkeys[i], commitment, share).expect("enc share should verify");
        }

        let mut dec_shares = Vec::new();
        for (i, share) in enc_shares.iter().enumerate() {
            let (sk, pk) = keys[i];
            let dec = decrypt_share(&mut rng, pk, sk, share);
            verify_dec_share(pk, share, &dec).expect("dec share should verify");
            dec_shares.push(dec);
        }

        let recovered = recover_secret(&enc_shares[..t], &dec_shares[..t], t).unwrap();
        assert_eq!(recovered, h * secret);

        // A disjoint subset of t shares recovers the same value.
        let recovered2 = recover_secret(&enc_shares[2..2 + t], &dec_shares[2..2 + t], t).unwrap();
        assert_eq!(recovered2, h * secret);
    }

    #[test]
    fn tampered_enc_share_fails_verification() {
        let mut rng = ChaCha20Rng::from_seed([12u8; 32]);
        let h = GroupElement::from_hash(b"tamper-session");
        let (_, pk0) = keypair(&mut rng);
        let (_, pk1) = keypair(&mut rng);
        let pubkeys = vec![pk0, pk1];
        let (mut enc_shares, pub_poly) = encrypt_shares(&mut rng, h, &pubkeys, None, 2);

        // Swap column 0's ciphertext with column 1's: should fail to verify
        // against column 0's commitment.
        let swapped = enc_shares[1];
        enc_shares[0].c = swapped.c;
        enc_shares[0].k = swapped.k;

        let commitment0 = pub_poly.eval(0).v;
        assert!(verify_enc_share(pubkeys[0], commitment0, &enc_shares[0]).is_err());
    }

    #[test]
    fn not_enough_shares_errs() {
        let mut rng = ChaCha20Rng::from_seed([13u8; 32]);
        let h = GroupElement::from_hash(b"short-session");
        let (sk0, pk0) = keypair(&mut rng);
        let pubkeys = vec![pk0];
        let (enc_shares, _pub_poly) = encrypt_shares(&mut rng, h, &pubkeys, None, 2);
        let dec = decrypt_share(&mut rng, pk0, sk0, &enc_shares[0]);
        let err = recover_secret(&enc_shares, &[dec], 2).unwrap_err();
        assert!(matches!(err, PvssError::NotEnoughShares { .. }));
    }
}
