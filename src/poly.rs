//! Shamir secret sharing polynomials over the group defined in [`crate::group`].
//!
//! Mirrors the `PriPoly`/`PubPoly` split the dedis VSS/DKG lineage uses
//! throughout: a private polynomial with scalar coefficients, and its
//! per-coefficient commitment under a group base, each evaluated by the
//! same Horner's-method walk just in different domains.

use crate::group::{GroupElement, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// A private (coefficient-secret) polynomial of degree `t - 1`.
#[derive(Clone, Debug)]
pub struct PriPoly {
    coeffs: Vec<Scalar>,
}

/// A single evaluation of a [`PriPoly`] at index `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriShare {
    pub i: u32,
    pub v: Scalar,
}

/// The public commitment to a [`PriPoly`]: `commits[k] = coeffs[k] * base`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubPoly {
    base: GroupElement,
    commits: Vec<GroupElement>,
}

/// A single evaluation of a [`PubPoly`] at index `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PubShare {
    pub i: u32,
    pub v: GroupElement,
}

impl PriPoly {
    /// Samples a random degree `t - 1` polynomial. If `secret` is `Some`, the
    /// free coefficient is pinned to it (the dealer's secret); otherwise the
    /// free coefficient is random too (used for the blinding polynomial in
    /// some VSS variants).
    pub fn new<R: RngCore + CryptoRng>(t: usize, secret: Option<Scalar>, rng: &mut R) -> Self {
        assert!(t >= 1, "threshold must be at least 1");
        let mut coeffs = Vec::with_capacity(t);
        coeffs.push(secret.unwrap_or_else(|| Scalar::random(rng)));
        for _ in 1..t {
            coeffs.push(Scalar::random(rng));
        }
        PriPoly { coeffs }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn secret(&self) -> Scalar {
        self.coeffs[0]
    }

    /// Evaluates the polynomial at `x = i + 1` (indices are 0-based
    /// recipient/column positions; the polynomial itself is evaluated at
    /// positive field elements so that `f(0)` stays the hidden secret).
    pub fn eval(&self, i: u32) -> PriShare {
        let x = Scalar::from_u64(i as u64 + 1);
        let mut result = Scalar::zero();
        for coeff in self.coeffs.iter().rev() {
            result = result * x + *coeff;
        }
        PriShare { i, v: result }
    }

    /// Commits each coefficient under `base`, producing the matching
    /// [`PubPoly`].
    pub fn commit(&self, base: GroupElement) -> PubPoly {
        PubPoly {
            base,
            commits: self.coeffs.iter().map(|c| base * *c).collect(),
        }
    }
}

impl PubPoly {
    pub fn new(base: GroupElement, commits: Vec<GroupElement>) -> Self {
        PubPoly { base, commits }
    }

    pub fn base(&self) -> GroupElement {
        self.base
    }

    pub fn commits(&self) -> &[GroupElement] {
        &self.commits
    }

    pub fn degree(&self) -> usize {
        self.commits.len() - 1
    }

    /// Evaluates the committed polynomial at `x = i + 1` via Horner's method
    /// in the exponent.
    pub fn eval(&self, i: u32) -> PubShare {
        let x = Scalar::from_u64(i as u64 + 1);
        let mut result = GroupElement::identity();
        for commit in self.commits.iter().rev() {
            result = result * x + *commit;
        }
        PubShare { i, v: result }
    }
}

/// Lagrange-recovers the secret `f(0)` in the exponent from `t` public shares
/// (i.e. `G * f(0)` given `t` values of `G * f(i)`). Used by
/// [`crate::pvss::recover_secret`] once enough decrypted shares have
/// been gathered.
pub fn recover_commit(shares: &[PubShare], t: usize) -> Option<GroupElement> {
    if shares.len() < t {
        return None;
    }
    let chosen = &shares[..t];
    let mut acc = GroupElement::identity();
    for (j, share_j) in chosen.iter().enumerate() {
        let mut num = Scalar::one();
        let mut den = Scalar::one();
        let xj = Scalar::from_u64(share_j.i as u64 + 1);
        for (k, share_k) in chosen.iter().enumerate() {
            if j == k {
                continue;
            }
            let xk = Scalar::from_u64(share_k.i as u64 + 1);
            num = num * xk;
            den = den * (xk - xj);
        }
        let lagrange = num * den.invert();
        acc = acc + share_j.v * lagrange;
    }
    Some(acc)
}
