//! Typed errors for the protocol layer (§7). One enum per concern: this one
//! for the driver-facing protocol contract, [`crate::pvss::PvssError`] for
//! the primitive underneath it.

use crate::overlay::OverlayError;
use crate::pvss::PvssError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad parameters: f={f} must satisfy 3*f < n (n={n})")]
    BadParameters { n: u32, f: u32 },

    #[error("message from participant {src} carries a session id for a different run")]
    WrongSession { src: u32 },

    #[error("duplicate {kind} message from participant {src}, dropped")]
    DuplicateSender { kind: &'static str, src: u32 },

    #[error("share at row {row} column {col} failed verification")]
    InvalidShare {
        row: u32,
        col: u32,
        #[source]
        source: PvssError,
    },

    #[error("only {n_prime} dealers were voted good out of {n}, need more than {f}")]
    InsufficientGoodDealers { n_prime: u32, f: u32, n: u32 },

    #[error("failed to recover the secret for row {row}")]
    RecoverFailure {
        row: u32,
        #[source]
        source: PvssError,
    },

    #[error("random() called before the session reached Done")]
    NotReady,

    #[error("verification failed at step {step}: {reason}")]
    VerifyFailure { step: &'static str, reason: String },

    #[error("participant has not completed Setup")]
    NotSetUp,

    #[error("overlay delivery failed")]
    Overlay(#[from] OverlayError),
}
