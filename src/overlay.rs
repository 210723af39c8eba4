//! The transport boundary this crate depends on but does not implement
//! (§1 "out of scope external collaborators" — "the overlay that delivers
//! authenticated point-to-point and broadcast messages between
//! participants"). `tests/` provides an in-memory implementation; a real
//! deployment would back this with libp2p, gRPC, or similar.

use crate::group::{GroupElement, Scalar};
use crate::messages::WireMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("no such peer at roster index {0}")]
    UnknownPeer(u32),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A fixed, indexed roster of `n` participants with authenticated
/// point-to-point send and broadcast.
pub trait Overlay: Send + Sync {
    /// `X[0..n)`, the ordered public keys of the roster.
    fn roster(&self) -> &[GroupElement];

    /// This node's position within [`Overlay::roster`].
    fn index(&self) -> u32;

    /// This node's secret key, matching `roster()[index()]`.
    fn private_key(&self) -> &Scalar;

    fn send_to(&self, to: u32, msg: WireMessage) -> Result<(), OverlayError>;

    fn broadcast(&self, msg: WireMessage) -> Result<(), OverlayError>;
}
