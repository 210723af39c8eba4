//! The `Participant` state machine (§4, §5): the single component type
//! this crate implements, replicated at each of the `n` nodes.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rand::rngs::OsRng;

use crate::error::ProtocolError;
use crate::group::GroupElement;
use crate::messages::{AMessage, RMessage, RShareEntry, VMessage, VoteMsg, WireMessage};
use crate::overlay::Overlay;
use crate::poly::PubPoly;
use crate::pvss;
use crate::session::{SessionParams, VotingPolicy};
use crate::state::{LocalState, ParticipantState, RowState};
use crate::transcript::Transcript;

/// A one-shot completion signal, implemented with a plain `Condvar` pair so
/// the crate never forces an async runtime on its driver.
#[derive(Default)]
pub struct DoneSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl DoneSignal {
    fn new() -> Self {
        DoneSignal {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn fire(&self) {
        let mut done = self.flag.lock().unwrap();
        if !*done {
            *done = true;
            self.cond.notify_all();
        }
    }

    pub fn wait(&self) {
        let mut done = self.flag.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }

    /// Waits up to `timeout`; returns whether `Done` fired in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let done = self.flag.lock().unwrap();
        if *done {
            return true;
        }
        let (done, result) = self.cond.wait_timeout(done, timeout).unwrap();
        *done && !result.timed_out()
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap()
    }
}

/// One node's replica of the beacon protocol. `f` is a deployment-wide
/// constant every node is configured with identically, the same way every
/// node is configured with the same roster — so unlike `purpose`/`time`
/// (which a non-initiator only learns from the first `A` it sees), it does
/// not need to ride along on the wire for the bootstrap path in §4.3.1.
pub struct Participant {
    f: u32,
    state: Mutex<ParticipantState>,
    done: DoneSignal,
}

impl Participant {
    pub fn new(f: u32) -> Self {
        Participant {
            f,
            state: Mutex::new(ParticipantState::default()),
            done: DoneSignal::new(),
        }
    }

    pub fn done(&self) -> &DoneSignal {
        &self.done
    }

    /// `Setup(n, f, purpose, time, policy)` (§4.1). `n` and `X` come from
    /// the overlay's roster.
    pub fn setup(
        &self,
        overlay: &dyn Overlay,
        purpose: String,
        time: i64,
        policy: VotingPolicy,
    ) -> Result<(), ProtocolError> {
        let mut guard = self.state.lock().unwrap();
        self.setup_locked(&mut guard, overlay, purpose, time, policy)
    }

    /// The body of `Setup`, run with the state mutex already held. Kept
    /// separate so `handle_a`'s bootstrap path can check-and-setup under
    /// one critical section instead of racing a second `setup()` call for
    /// the lock (§4.1: "a second Setup on the same instance must replace
    /// state atomically").
    fn setup_locked(
        &self,
        guard: &mut ParticipantState,
        overlay: &dyn Overlay,
        purpose: String,
        time: i64,
        policy: VotingPolicy,
    ) -> Result<(), ProtocolError> {
        let x = overlay.roster().to_vec();
        let n = x.len() as u32;
        let params = SessionParams::new(n, self.f, purpose, time, x, policy)?;
        guard.local = LocalState::reset_for(n);
        guard.params = Some(params);
        tracing::info!(n, f = self.f, "session set up");
        Ok(())
    }

    /// `Start()` (§4.1) — initiator only.
    pub fn start(&self, overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        let a = {
            let mut guard = self.state.lock().unwrap();
            self.deal(&mut guard, overlay)?
        };
        overlay.broadcast(WireMessage::A(a))?;
        Ok(())
    }

    /// Generates this participant's own encrypted share row (§4.2) and
    /// records it locally before returning the `A` to broadcast.
    fn deal(
        &self,
        guard: &mut ParticipantState,
        overlay: &dyn Overlay,
    ) -> Result<AMessage, ProtocolError> {
        let params = guard.params.as_ref().ok_or(ProtocolError::NotSetUp)?.clone();
        let self_idx = overlay.index();
        let mut rng = OsRng;
        let (enc_shares, pub_poly) =
            pvss::encrypt_shares(&mut rng, params.h, &params.x, None, params.t as usize);

        {
            let row = guard.local.enc_shares.entry(self_idx).or_default();
            for share in &enc_shares {
                row.insert(share.i, *share);
            }
        }
        guard.local.pub_polys.insert(self_idx, pub_poly.clone());
        guard.local.row_state.insert(self_idx, RowState::Complete);
        tracing::info!(src = self_idx, "dealt own row");

        Ok(AMessage {
            session_id: params.session_id,
            src: self_idx,
            b: pub_poly.base(),
            commits: pub_poly.commits().to_vec(),
            shares: enc_shares,
            purpose: params.purpose.clone(),
            time: params.time,
        })
    }

    /// Dispatches any incoming wire message to its handler.
    pub fn handle(&self, msg: WireMessage, overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        match msg {
            WireMessage::A(a) => self.handle_a(a, overlay),
            WireMessage::V(v) => self.handle_v(v, overlay),
            WireMessage::R(r) => self.handle_r(r, overlay),
        }
    }

    /// Handler for `A` (§4.3).
    pub fn handle_a(&self, msg: AMessage, overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        // Bootstrap check-and-setup-and-deal happens under one lock
        // acquisition: two concurrent first-seen `A`s from different
        // dealers must not both observe `params.is_none()` and each run
        // their own `Setup` (which would wipe the other's collected rows)
        // plus their own self-deal.
        let own_a = {
            let mut guard = self.state.lock().unwrap();
            if guard.params.is_none() {
                self.setup_locked(&mut guard, overlay, msg.purpose.clone(), msg.time, VotingPolicy::default())?;
                Some(self.deal(&mut guard, overlay)?)
            } else {
                None
            }
        };
        if let Some(own_a) = own_a {
            overlay.broadcast(WireMessage::A(own_a))?;
        }

        let vote_msg = {
            let mut guard = self.state.lock().unwrap();
            let params = guard.params.clone().ok_or(ProtocolError::NotSetUp)?;

            if msg.session_id != params.session_id {
                tracing::debug!(src = msg.src, "dropping A: wrong session");
                return Ok(());
            }
            if guard.local.row_state(msg.src) != RowState::Empty {
                tracing::debug!(src = msg.src, "dropping duplicate A");
                return Ok(());
            }

            guard.local.row_state.insert(msg.src, RowState::Collecting);
            let pub_poly = PubPoly::new(params.h, msg.commits.clone());

            for share in &msg.shares {
                let col = share.i;
                if col >= params.n {
                    continue;
                }
                let commitment = pub_poly.eval(col).v;
                let recipient_pub = params.x[col as usize];
                match pvss::verify_enc_share(recipient_pub, commitment, share) {
                    Ok(()) => {
                        guard
                            .local
                            .enc_shares
                            .entry(msg.src)
                            .or_default()
                            .insert(col, *share);
                    }
                    Err(error) => {
                        tracing::warn!(row = msg.src, col, %error, "dropping invalid encrypted share");
                    }
                }
            }
            guard.local.pub_polys.insert(msg.src, pub_poly);

            let accepted = guard
                .local
                .enc_shares
                .get(&msg.src)
                .map(|m| m.len())
                .unwrap_or(0) as u32;
            if accepted >= 2 * params.f + 1 {
                guard.local.row_state.insert(msg.src, RowState::Complete);
            }

            self.maybe_build_vote(&mut guard, &params, overlay.index())
        };

        if let Some(vote_msg) = vote_msg {
            overlay.broadcast(WireMessage::V(vote_msg))?;
        }
        Ok(())
    }

    /// Vote trigger (§4.3.7): fires once, exactly when every row has been
    /// decided (or the driver has forced collection to close, §5
    /// "Cancellation / timeout").
    fn maybe_build_vote(
        &self,
        guard: &mut ParticipantState,
        params: &SessionParams,
        self_idx: u32,
    ) -> Option<VMessage> {
        if guard.local.self_voted {
            return None;
        }
        if !guard.local.all_rows_decided(params.n) {
            return None;
        }
        guard.local.self_voted = true;

        let mut votes = BTreeMap::new();
        for r in 0..params.n {
            let good = guard.local.row_state(r) == RowState::Complete;
            votes.insert(
                r,
                VoteMsg {
                    voted: true,
                    vote: good as i32,
                },
            );
            if good {
                guard.local.votes.entry(r).or_default().tally += 1;
            }
        }
        guard.local.votes.entry(self_idx).or_default().voted = true;

        tracing::info!(src = self_idx, "broadcasting vote");
        Some(VMessage {
            session_id: params.session_id,
            src: self_idx,
            votes,
        })
    }

    /// Forces the vote trigger to fire even if some dealer never
    /// broadcast an `A` (§5 notes the core itself is untimed; the driver
    /// supplies the deadline and calls this once it elapses).
    pub fn collection_timeout(&self, overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        let vote_msg = {
            let mut guard = self.state.lock().unwrap();
            let params = guard.params.clone().ok_or(ProtocolError::NotSetUp)?;
            guard.local.collection_forced = true;
            self.maybe_build_vote(&mut guard, &params, overlay.index())
        };
        if let Some(vote_msg) = vote_msg {
            overlay.broadcast(WireMessage::V(vote_msg))?;
        }
        Ok(())
    }

    /// Handler for `V` (§4.4).
    pub fn handle_v(&self, msg: VMessage, overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        let r_msg = {
            let mut guard = self.state.lock().unwrap();
            let params = guard.params.clone().ok_or(ProtocolError::NotSetUp)?;

            if msg.session_id != params.session_id {
                tracing::debug!(src = msg.src, "dropping V: wrong session");
                return Ok(());
            }
            let already_voted = guard
                .local
                .votes
                .get(&msg.src)
                .map(|e| e.voted)
                .unwrap_or(false);
            if already_voted {
                tracing::debug!(src = msg.src, "dropping duplicate V");
                return Ok(());
            }

            for r in 0..params.n {
                if let Some(vote) = msg.votes.get(&r) {
                    if vote.vote != 0 {
                        guard.local.votes.entry(r).or_default().tally += 1;
                    }
                }
            }
            guard.local.votes.entry(msg.src).or_default().voted = true;

            self.maybe_open(&mut guard, &params, overlay)?
        };

        if let Some(r_msg) = r_msg {
            overlay.broadcast(WireMessage::R(r_msg))?;
        }
        Ok(())
    }

    /// Voting completion and Opening (§4.4 step 4, §4.5), guarded so it
    /// runs at most once per session.
    fn maybe_open(
        &self,
        guard: &mut ParticipantState,
        params: &SessionParams,
        overlay: &dyn Overlay,
    ) -> Result<Option<RMessage>, ProtocolError> {
        let voters_done = match params.policy {
            VotingPolicy::Strict => (0..params.n)
                .all(|r| guard.local.votes.get(&r).map(|e| e.voted).unwrap_or(false)),
            VotingPolicy::Quorum => {
                let voted = (0..params.n)
                    .filter(|r| guard.local.votes.get(r).map(|e| e.voted).unwrap_or(false))
                    .count() as u32;
                voted >= 2 * params.f + 1
            }
        };
        if !voters_done || guard.local.r_sent {
            return Ok(None);
        }

        let n_prime = (0..params.n)
            .filter(|r| guard.local.votes.get(r).map(|e| e.tally > params.f).unwrap_or(false))
            .count() as u32;
        if n_prime < params.f + 1 {
            return Err(ProtocolError::InsufficientGoodDealers {
                n_prime,
                f: params.f,
                n: params.n,
            });
        }
        guard.local.n_prime = Some(n_prime);
        guard.local.r_sent = true;
        tracing::info!(n_prime, "voting complete, opening own column");

        // Faster peers' `R`s may already have completed every row by the
        // time our own vote lands and `n_prime` is finally known (§5:
        // "the protocol tolerates any interleaving"). Since honest peers
        // only ever send one `R` (latched by `r_sent`), nothing would
        // otherwise re-run this check and `Done` would never fire.
        self.maybe_finish(guard);

        let self_idx = overlay.index();
        let mut rng = OsRng;
        let rows: Vec<u32> = guard
            .local
            .enc_shares
            .iter()
            .filter(|(_, cols)| cols.contains_key(&self_idx))
            .map(|(row, _)| *row)
            .collect();

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let share = guard.local.enc_shares[&row][&self_idx];
            let recipient_pub = params.x[self_idx as usize];
            let dec = pvss::decrypt_share(&mut rng, recipient_pub, *overlay.private_key(), &share);
            guard
                .local
                .dec_shares
                .entry(row)
                .or_default()
                .insert(self_idx, dec);
            entries.push(RShareEntry { row, dec });
        }

        Ok(Some(RMessage {
            session_id: params.session_id,
            src: self_idx,
            shares: entries,
        }))
    }

    /// Handler for `R` (§4.6).
    pub fn handle_r(&self, msg: RMessage, _overlay: &dyn Overlay) -> Result<(), ProtocolError> {
        let mut guard = self.state.lock().unwrap();
        let params = guard.params.clone().ok_or(ProtocolError::NotSetUp)?;

        if msg.session_id != params.session_id {
            tracing::debug!(src = msg.src, "dropping R: wrong session");
            return Ok(());
        }
        if *guard.local.r_seen.get(&msg.src).unwrap_or(&false) {
            tracing::debug!(src = msg.src, "dropping duplicate R");
            return Ok(());
        }
        guard.local.r_seen.insert(msg.src, true);

        let t = params.t;

        for entry in &msg.shares {
            let row = entry.row;
            let tally_good = guard
                .local
                .votes
                .get(&row)
                .map(|e| e.tally > params.f)
                .unwrap_or(false);
            if !tally_good || guard.local.secrets.contains_key(&row) {
                continue;
            }
            let enc = match guard.local.enc_shares.get(&row).and_then(|m| m.get(&msg.src)) {
                Some(e) => *e,
                None => continue,
            };
            let recipient_pub = params.x[msg.src as usize];
            if let Err(error) = pvss::verify_dec_share(recipient_pub, &enc, &entry.dec) {
                tracing::warn!(row, col = msg.src, %error, "dropping invalid decrypted share");
                continue;
            }
            guard
                .local
                .dec_shares
                .entry(row)
                .or_default()
                .insert(msg.src, entry.dec);

            let dec_count = guard.local.dec_shares.get(&row).map(|m| m.len()).unwrap_or(0);
            if dec_count >= t as usize {
                let enc_row: Vec<_> = guard.local.enc_shares[&row].values().copied().collect();
                let dec_row: Vec<_> = guard.local.dec_shares[&row].values().copied().collect();
                match pvss::recover_secret(&enc_row, &dec_row, t as usize) {
                    Ok(secret) => {
                        guard.local.secrets.insert(row, secret);
                        tracing::info!(row, "recovered secret");
                    }
                    Err(source) => return Err(ProtocolError::RecoverFailure { row, source }),
                }
            }
        }

        self.maybe_finish(&mut guard);
        Ok(())
    }

    /// Fires `Done` once `n_prime` good rows all have a recovered secret.
    /// Called from both `maybe_open` (a participant's own last vote can
    /// arrive after enough peers' `R`s have already completed every row)
    /// and `handle_r` (the common case of completing on a just-received
    /// share), so `Done` cannot depend on which of the two happens last.
    fn maybe_finish(&self, guard: &mut ParticipantState) {
        let Some(n_prime) = guard.local.n_prime else {
            return;
        };
        if guard.local.coin.is_none() && guard.local.secrets.len() as u32 == n_prime {
            let coin: GroupElement = guard.local.secrets.values().copied().sum();
            guard.local.coin = Some(coin);
            tracing::info!("coin computed");
            self.done.fire();
        }
    }

    /// `Random()` (§4.7).
    pub fn random(&self) -> Result<(Vec<u8>, Transcript), ProtocolError> {
        if !self.done.is_set() {
            return Err(ProtocolError::NotReady);
        }
        let guard = self.state.lock().unwrap();
        let params = guard.params.clone().ok_or(ProtocolError::NotSetUp)?;
        let coin = guard.local.coin.ok_or(ProtocolError::NotReady)?;

        let transcript = Transcript {
            session_id: params.session_id,
            suite: params.suite,
            n: params.n,
            f: params.f,
            purpose: params.purpose.clone(),
            time: params.time,
            x: params.x.clone(),
            h: params.h,
            policy: params.policy,
            enc_shares: guard.local.enc_shares.clone(),
            pub_polys: guard.local.pub_polys.clone(),
            dec_shares: guard.local.dec_shares.clone(),
            votes: guard.local.votes.clone(),
            secrets: guard.local.secrets.clone(),
        };
        Ok((coin.to_bytes().to_vec(), transcript))
    }
}
