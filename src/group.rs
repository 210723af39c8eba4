//! Thin wrapper around a prime-order group (Ristretto255).
//!
//! `Scalar` and `GroupElement` are the only types the rest of the crate
//! touches; nothing above this module reaches into `curve25519_dalek_ng`
//! directly. Canonical (de)serialization here is what makes the transcript's
//! `coinBytes` byte-stable across two honest implementations of the suite.

use blake2::{Blake2b512, Digest};
use curve25519_dalek_ng::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek_ng::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek_ng::scalar::Scalar as DalekScalar;
use curve25519_dalek_ng::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use zeroize::Zeroize;

/// A scalar in the Ristretto255 field. Zeroized on drop since these back
/// polynomial coefficients and, transitively, the secret being shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroize)]
pub struct Scalar(DalekScalar);

impl Scalar {
    pub const BYTE_LEN: usize = 32;

    pub fn zero() -> Self {
        Scalar(DalekScalar::zero())
    }

    pub fn one() -> Self {
        Scalar(DalekScalar::one())
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Scalar(DalekScalar::random(rng))
    }

    pub fn from_u64(v: u64) -> Self {
        Scalar(DalekScalar::from(v))
    }

    pub fn invert(&self) -> Self {
        Scalar(self.0.invert())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        DalekScalar::from_canonical_bytes(*bytes).map(Scalar)
    }

    /// Maps an arbitrary-length context string to a scalar by wide reduction
    /// of a 64-byte Blake2b digest. Used to derive per-recipient challenge
    /// scalars in the DLEQ proofs (`pvss` module), not for `H` itself (which
    /// needs a *point*, see [`GroupElement::from_hash`]).
    pub fn from_hash(data: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&digest);
        Scalar(DalekScalar::from_bytes_mod_order_wide(&wide))
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(s)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        Scalar::from_bytes(&bytes).ok_or_else(|| serde::de::Error::custom("non-canonical scalar"))
    }
}

/// A group element of Ristretto255.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupElement(RistrettoPoint);

impl GroupElement {
    pub const BYTE_LEN: usize = 32;

    pub fn identity() -> Self {
        GroupElement(RistrettoPoint::identity())
    }

    pub fn generator() -> Self {
        GroupElement(RISTRETTO_BASEPOINT_POINT)
    }

    /// Hashes an arbitrary byte string to a uniformly random group element.
    /// Used both to derive the session's second base `H` from `H_SID`, and
    /// by `SessionId` itself where the wider protocol calls for hash-to-curve.
    pub fn from_hash(data: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(b"randbeacon-hash-to-point");
        hasher.update(data);
        let digest = hasher.finalize();
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&digest);
        GroupElement(RistrettoPoint::from_uniform_bytes(&wide))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        CompressedRistretto::from_slice(bytes)
            .decompress()
            .map(GroupElement)
    }
}

impl Add for GroupElement {
    type Output = GroupElement;
    fn add(self, rhs: GroupElement) -> GroupElement {
        GroupElement(self.0 + rhs.0)
    }
}

impl AddAssign for GroupElement {
    fn add_assign(&mut self, rhs: GroupElement) {
        self.0 += rhs.0;
    }
}

impl Sub for GroupElement {
    type Output = GroupElement;
    fn sub(self, rhs: GroupElement) -> GroupElement {
        GroupElement(self.0 - rhs.0)
    }
}

impl Mul<Scalar> for GroupElement {
    type Output = GroupElement;
    fn mul(self, rhs: Scalar) -> GroupElement {
        GroupElement(self.0 * rhs.0)
    }
}

impl Sum for GroupElement {
    fn sum<I: Iterator<Item = GroupElement>>(iter: I) -> Self {
        iter.fold(GroupElement::identity(), |acc, x| acc + x)
    }
}

impl Serialize for GroupElement {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(s)
    }
}

impl<'de> Deserialize<'de> for GroupElement {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        GroupElement::from_bytes(&bytes)
            .ok_or_else(|| serde::de::Error::custom("invalid ristretto point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn scalar_round_trip() {
        let mut rng = ChaCha20Rng::from_seed([7u8; 32]);
        let s = Scalar::random(&mut rng);
        let bytes = s.to_bytes();
        assert_eq!(Scalar::from_bytes(&bytes), Some(s));
    }

    #[test]
    fn group_from_hash_is_deterministic() {
        let a = GroupElement::from_hash(b"session-id-bytes");
        let b = GroupElement::from_hash(b"session-id-bytes");
        assert_eq!(a, b);
        let c = GroupElement::from_hash(b"different");
        assert_ne!(a, c);
    }

    #[test]
    fn scalar_mul_distributes_over_add() {
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        let g = GroupElement::generator();
        assert_eq!(g * (a + b), g * a + g * b);
    }
}
