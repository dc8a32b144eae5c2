use async_trait::async_trait;
use num_bigint::BigInt;
use rand::rngs::OsRng;
use tracing::debug;

use super::round_3::Round3;
use super::{KeygenContent, KeygenState, KgRound2Message1, KgRound2Message2};
use crate::culprits::{check_aux_params, Culprits, PeerAuxParams};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{received, run_blocking, Round};
use crate::verifier::JoinBarrier;

pub(crate) struct Round2 {
    state: KeygenState,
    started: bool,
}

impl Round2 {
    pub fn new(state: KeygenState) -> Self {
        Self {
            state,
            started: false,
        }
    }

    /// Structural checks and concurrent proof verification of every round 1 message
    async fn verify_round_1(&self) -> Result<()> {
        let st = &self.state;
        let i = st.i();
        let mut culprits = Culprits::new();

        let mut peers = Vec::with_capacity(st.party_count());
        for j in 0..st.party_count() {
            let msg = received(&st.temp.r1_messages, j, 2)?;
            peers.push(PeerAuxParams {
                slot: j,
                paillier_n: msg.unmarshal_paillier_pk().n,
                ntilde: msg.unmarshal_n_tilde(),
                h1: msg.unmarshal_h1(),
                h2: msg.unmarshal_h2(),
            });
        }
        check_aux_params(&peers, st.params.config().paillier_modulus_bits, &mut culprits);

        debug!(
            party = %st.party_id(),
            concurrency = st.params.config().concurrency,
            "verifying round 1 proofs"
        );
        let mut barrier = JoinBarrier::new();
        for peer in peers.iter().filter(|p| p.slot != i) {
            let j = peer.slot;
            let msg = received(&st.temp.r1_messages, j, 2)?;
            st.verifier
                .verify_dln_proof_1(msg, &peer.h1, &peer.h2, &peer.ntilde, barrier.slot((j, "dln proof 1")))
                .await;
            st.verifier
                .verify_dln_proof_2(msg, &peer.h2, &peer.h1, &peer.ntilde, barrier.slot((j, "dln proof 2")))
                .await;
            st.verifier
                .verify_param_proof(msg, &peer.ntilde, &peer.h2, &peer.h1, barrier.slot((j, "param proof")))
                .await;
            st.verifier
                .verify_mod_proof(msg, &peer.paillier_n, barrier.slot((j, "mod proof")))
                .await;
        }
        for (j, check) in barrier.wait().await {
            culprits.blame(j, format!("{} verification failed", check));
        }

        culprits.into_result(super::TASK_NAME, 2, st.party_id(), st.params.parties().ids())
    }
}

#[async_trait]
impl Round<KeygenContent> for Round2 {
    fn round_number(&self) -> u32 {
        2
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(2, "round already started", Vec::new()));
        }
        self.started = true;
        self.state.reset_ok();

        self.verify_round_1().await?;

        let st = &mut self.state;
        let i = st.i();

        // keep every peer's public parameters
        for j in 0..st.party_count() {
            if j == i {
                continue;
            }
            let msg = received(&st.temp.r1_messages, j, 2)?;
            let (pk, ntilde, h1, h2, kgc) = (
                msg.unmarshal_paillier_pk(),
                msg.unmarshal_n_tilde(),
                msg.unmarshal_h1(),
                msg.unmarshal_h2(),
                msg.unmarshal_commitment(),
            );
            st.save.paillier_pks[j] = pk;
            st.save.ntilde_j[j] = ntilde;
            st.save.h1_j[j] = h1;
            st.save.h2_j[j] = h2;
            st.temp.kgcs[j] = kgc;
        }

        // shares, each with a factor proof under the receiver's parameters
        let receivers: Vec<(usize, BigInt, BigInt, BigInt)> = (0..st.party_count())
            .filter(|&j| j != i)
            .map(|j| (j, st.save.ntilde_j[j].clone(), st.save.h1_j[j].clone(), st.save.h2_j[j].clone()))
            .collect();
        let paillier_sk = st.save.pre_params.paillier_sk.clone();
        let proofs = run_blocking("round 2 factor proofs", move || {
            let mut rng = OsRng;
            let mut proofs = Vec::with_capacity(receivers.len());
            for (j, ntilde_j, h1_j, h2_j) in &receivers {
                proofs.push((*j, paillier_sk.factor_proof(&mut rng, ntilde_j, h1_j, h2_j)?));
            }
            Ok(proofs)
        })
        .await?;
        debug!(party = %st.params.party_id(), count = proofs.len(), "factor proofs ready");

        let parties = st.params.parties().ids().to_vec();
        for (j, factor_proof) in proofs {
            let msg = KgRound2Message1::new(&st.temp.shares[j].share, &factor_proof);
            st.send_to(&parties[j], KeygenContent::Round2Share(msg))?;
        }

        let msg = KgRound2Message2::new(&st.temp.de_commit_poly_g);
        st.temp.r2_decommits[i] = Some(msg.clone());
        st.broadcast(KeygenContent::Round2DeCommit(msg))
    }

    fn can_accept(&self, msg: &Message<KeygenContent>) -> bool {
        match msg.content {
            KeygenContent::Round2Share(_) => !msg.is_broadcast(),
            KeygenContent::Round2DeCommit(_) => msg.is_broadcast(),
            _ => false,
        }
    }

    fn store_message(&mut self, msg: Message<KeygenContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        let i = self.state.i();
        for j in 0..self.state.party_count() {
            if self.state.ok[j] {
                continue;
            }
            if j != i && self.state.temp.r2_shares[j].is_none() {
                return Ok(false);
            }
            if self.state.temp.r2_decommits[j].is_none() {
                return Ok(false);
            }
            self.state.ok[j] = true;
        }
        Ok(true)
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        let mut waiting = self.state.missing(&self.state.temp.r2_shares, true);
        for p in self.state.missing(&self.state.temp.r2_decommits, false) {
            if !waiting.contains(&p) {
                waiting.push(p);
            }
        }
        waiting
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<KeygenContent>>> {
        Some(Box::new(Round3::new(self.state)))
    }
}
