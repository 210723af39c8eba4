//! End-to-end scenarios over an in-memory `Overlay`, covering the
//! concrete cases laid out for the protocol (happy path, a dealer that
//! never announces, a malformed share that still lets its row complete,
//! a liveness stall under the strict voting policy, and a tampered
//! transcript getting rejected by the public verifier).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use randbeacon::group::{GroupElement, Scalar};
use randbeacon::messages::WireMessage;
use randbeacon::overlay::{Overlay, OverlayError};
use randbeacon::session::VotingPolicy;
use randbeacon::{transcript, Participant, ProtocolError};

type Outbox = Arc<Mutex<VecDeque<(Option<u32>, u32, WireMessage)>>>;

struct TestOverlay {
    index: u32,
    roster: Vec<GroupElement>,
    private_key: Scalar,
    outbox: Outbox,
}

impl Overlay for TestOverlay {
    fn roster(&self) -> &[GroupElement] {
        &self.roster
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn private_key(&self) -> &Scalar {
        &self.private_key
    }

    fn send_to(&self, to: u32, msg: WireMessage) -> Result<(), OverlayError> {
        self.outbox.lock().unwrap().push_back((Some(to), self.index, msg));
        Ok(())
    }

    fn broadcast(&self, msg: WireMessage) -> Result<(), OverlayError> {
        self.outbox.lock().unwrap().push_back((None, self.index, msg));
        Ok(())
    }
}

/// A fully synchronous in-memory network: every send/broadcast lands in a
/// shared queue, and `pump` drains it breadth-first until quiescent.
struct Network {
    participants: Vec<Participant>,
    overlays: Vec<TestOverlay>,
    outbox: Outbox,
}

impl Network {
    fn new(n: u32, f: u32) -> Self {
        let mut rng = ChaCha20Rng::from_seed([99u8; 32]);
        let keys: Vec<(Scalar, GroupElement)> = (0..n)
            .map(|_| {
                let sk = Scalar::random(&mut rng);
                (sk, GroupElement::generator() * sk)
            })
            .collect();
        let roster: Vec<GroupElement> = keys.iter().map(|(_, pk)| *pk).collect();
        let outbox: Outbox = Arc::new(Mutex::new(VecDeque::new()));

        let mut overlays = Vec::new();
        let mut participants = Vec::new();
        for i in 0..n {
            overlays.push(TestOverlay {
                index: i,
                roster: roster.clone(),
                private_key: keys[i as usize].0,
                outbox: outbox.clone(),
            });
            participants.push(Participant::new(f));
        }
        Network {
            participants,
            overlays,
            outbox,
        }
    }

    fn pump(&self) -> Vec<(u32, ProtocolError)> {
        self.pump_filtered(|_, _| false)
    }

    /// Like [`Network::pump`], but messages for which `drop_msg` returns
    /// `true` are discarded as if lost in transit (used to simulate a peer
    /// going silent mid-round).
    fn pump_filtered(&self, mut drop_msg: impl FnMut(u32, &WireMessage) -> bool) -> Vec<(u32, ProtocolError)> {
        let mut errors = Vec::new();
        loop {
            let next = self.outbox.lock().unwrap().pop_front();
            let Some((to, from, msg)) = next else {
                break;
            };
            if drop_msg(from, &msg) {
                continue;
            }
            match to {
                Some(dest) => {
                    if let Err(e) = self.participants[dest as usize].handle(msg, &self.overlays[dest as usize]) {
                        errors.push((dest, e));
                    }
                }
                None => {
                    for i in 0..self.participants.len() as u32 {
                        if i == from {
                            continue;
                        }
                        if let Err(e) =
                            self.participants[i as usize].handle(msg.clone(), &self.overlays[i as usize])
                        {
                            errors.push((i, e));
                        }
                    }
                }
            }
        }
        errors
    }

    fn assert_all_done(&self) {
        for (i, p) in self.participants.iter().enumerate() {
            assert!(
                p.done().wait_timeout(Duration::from_secs(1)),
                "participant {i} never reached Done"
            );
        }
    }
}

#[test]
fn happy_path_five_participants_one_fault_budget() {
    let net = Network::new(5, 1);
    net.participants[0]
        .setup(&net.overlays[0], "happy-path".into(), 1_700_000_000, VotingPolicy::Strict)
        .unwrap();
    net.participants[0].start(&net.overlays[0]).unwrap();

    let errors = net.pump();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    net.assert_all_done();

    let (coin0, transcript0) = net.participants[0].random().unwrap();
    for p in &net.participants[1..] {
        let (coin, _) = p.random().unwrap();
        assert_eq!(coin, coin0, "participants disagree on the coin");
    }
    transcript::verify(&coin0, &transcript0).expect("honest transcript must verify");
}

#[test]
fn silent_dealer_is_demoted_but_the_round_still_completes() {
    // n=7, f=2: participant 3 joins the session but never deals. Everyone
    // else still completes Collection of each other's rows; the driver's
    // collection timeout forces the vote trigger once row 3 is the only
    // one left undecided.
    let net = Network::new(7, 2);
    net.participants[3]
        .setup(&net.overlays[3], "silent-dealer".into(), 1, VotingPolicy::Strict)
        .unwrap();
    net.participants[0]
        .setup(&net.overlays[0], "silent-dealer".into(), 1, VotingPolicy::Strict)
        .unwrap();
    net.participants[0].start(&net.overlays[0]).unwrap();

    let mut errors = net.pump();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    for i in 0..7u32 {
        net.participants[i as usize]
            .collection_timeout(&net.overlays[i as usize])
            .unwrap();
    }
    errors.extend(net.pump());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    net.assert_all_done();

    let (coin0, _) = net.participants[0].random().unwrap();
    for (i, p) in net.participants.iter().enumerate() {
        let (coin, _) = p.random().unwrap();
        assert_eq!(coin, coin0, "participant {i} diverged");
    }
}

#[test]
fn malformed_share_in_one_cell_still_allows_row_completion() {
    // n=5, f=1: dealer 2's announce has column 4's share relabelled as
    // column 1's, so column 4 effectively vanishes from the row while
    // columns 0,1,2,3 remain valid -- 4 >= 2f+1=3, so the row still
    // completes and the malformed cell is simply dropped.
    let net = Network::new(5, 1);
    net.participants[2]
        .setup(&net.overlays[2], "malformed-share".into(), 42, VotingPolicy::Strict)
        .unwrap();
    net.participants[2].start(&net.overlays[2]).unwrap();

    let (to, from, msg) = net
        .outbox
        .lock()
        .unwrap()
        .pop_front()
        .expect("dealer 2's A broadcast should be queued");
    assert_eq!(to, None);
    assert_eq!(from, 2);
    let mut a_msg = match msg {
        WireMessage::A(a) => a,
        other => panic!("expected an A message, got {other:?}"),
    };
    let stolen = a_msg.shares[1];
    a_msg.shares[4] = stolen;

    for i in 0..5u32 {
        if i == 2 {
            continue;
        }
        net.participants[i as usize]
            .handle(WireMessage::A(a_msg.clone()), &net.overlays[i as usize])
            .unwrap();
    }

    let errors = net.pump();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    net.assert_all_done();

    let (coin0, transcript0) = net.participants[0].random().unwrap();
    for p in &net.participants[1..] {
        let (coin, _) = p.random().unwrap();
        assert_eq!(coin, coin0);
    }
    transcript::verify(&coin0, &transcript0).unwrap();
}

#[test]
fn strict_policy_stalls_if_a_voter_goes_silent() {
    // n=4, f=1: participant 3's vote never reaches anyone. Under the
    // default Strict policy every other participant waits forever for it,
    // so nobody reaches Done -- the documented liveness tradeoff of
    // requiring all n votes.
    let net = Network::new(4, 1);
    net.participants[0]
        .setup(&net.overlays[0], "abort".into(), 1, VotingPolicy::Strict)
        .unwrap();
    net.participants[0].start(&net.overlays[0]).unwrap();

    let errors = net.pump_filtered(|from, msg| from == 3 && matches!(msg, WireMessage::V(_)));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    for (i, p) in net.participants.iter().enumerate() {
        assert!(
            !p.done().wait_timeout(Duration::from_millis(50)),
            "participant {i} should not have reached Done"
        );
    }
}

#[test]
fn verifier_rejects_a_tampered_transcript() {
    let net = Network::new(5, 1);
    net.participants[0]
        .setup(&net.overlays[0], "tamper-verify".into(), 7, VotingPolicy::Strict)
        .unwrap();
    net.participants[0].start(&net.overlays[0]).unwrap();
    let errors = net.pump();
    assert!(errors.is_empty());
    net.assert_all_done();

    let (coin, mut tx) = net.participants[0].random().unwrap();
    transcript::verify(&coin, &tx).unwrap();

    let (&row, _) = tx.secrets.iter().next().unwrap();
    tx.secrets.insert(row, GroupElement::generator());

    let err = transcript::verify(&coin, &tx).unwrap_err();
    assert!(matches!(err, ProtocolError::VerifyFailure { .. }));
}
