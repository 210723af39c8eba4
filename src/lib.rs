//! A distributed, publicly-verifiable randomness beacon built on a
//! per-share ElGamal/Chaum-Pedersen PVSS scheme: a fixed committee of `n`
//! participants, tolerating up to `f < n/3` Byzantine members, cooperates
//! to produce a single unbiasable random group element (the *coin*)
//! together with a transcript any third party can verify without trusting
//! any committee member.
//!
//! [`participant::Participant`] is the only component type; [`overlay`]
//! defines the transport boundary a driver must satisfy; [`transcript`]
//! holds the stateless public verifier.

pub mod error;
pub mod group;
pub mod messages;
pub mod overlay;
pub mod participant;
pub mod poly;
pub mod pvss;
pub mod session;
pub mod state;
pub mod transcript;

pub use error::ProtocolError;
pub use group::{GroupElement, Scalar};
pub use messages::{AMessage, RMessage, RShareEntry, VMessage, VoteMsg, WireMessage};
pub use overlay::{Overlay, OverlayError};
pub use participant::{DoneSignal, Participant};
pub use pvss::{DecShare, EncShare, PvssError};
pub use session::{SessionId, SessionParams, VotingPolicy};
pub use transcript::{verify, Transcript};
