use async_trait::async_trait;
use concord_core::ec::{scalar_from_bigint, unflatten_points};
use concord_core::vss::{Share, Vs};
use concord_core::HashCommitDecommit;
use k256::{ProjectivePoint, Scalar};
use num_bigint::BigInt;
use rand::rngs::OsRng;
use tracing::debug;

use super::round_5::Round5;
use super::{DgRound4Message1, DgRound4Message2, ResharingContent, ResharingState, TASK_NAME};
use crate::culprits::{check_aux_params, Culprits, PeerAuxParams};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{received, run_blocking, Round};
use crate::verifier::JoinBarrier;

pub(crate) struct Round4 {
    state: ResharingState,
    started: bool,
}

impl Round4 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }

    /// Culprit slot of a new-committee member in `old_and_new_parties`
    fn new_slot(&self, j: usize) -> usize {
        self.state.old_count() + j
    }

    /// Structural checks and concurrent verification of every new peer's round 2 proofs
    async fn verify_new_peers(&self, culprits: &mut Culprits) -> Result<()> {
        let st = &self.state;
        let i = st.new_i()?;
        let key = st.new_key()?;
        let pre = &key.pre_params;

        let mut peers = Vec::with_capacity(st.new_count());
        for j in 0..st.new_count() {
            let slot = self.new_slot(j);
            if j == i {
                peers.push(PeerAuxParams {
                    slot,
                    paillier_n: pre.paillier_sk.n().clone(),
                    ntilde: pre.ntilde.clone(),
                    h1: pre.h1.clone(),
                    h2: pre.h2.clone(),
                });
                continue;
            }
            let msg = received(&st.temp.r2_messages1, j, 4)?;
            peers.push(PeerAuxParams {
                slot,
                paillier_n: msg.unmarshal_paillier_pk().n,
                ntilde: msg.unmarshal_n_tilde(),
                h1: msg.unmarshal_h1(),
                h2: msg.unmarshal_h2(),
            });
        }
        check_aux_params(&peers, st.params.config().paillier_modulus_bits, culprits);

        let keys = st.params.new_parties().keys();
        let mut barrier = JoinBarrier::new();
        for (j, peer) in peers.iter().enumerate().filter(|(j, _)| *j != i) {
            let msg = received(&st.temp.r2_messages1, j, 4)?;
            let slot = peer.slot;
            st.verifier
                .verify_key_proof(msg, &peer.paillier_n, &keys[j], &key.ecdsa_pub, barrier.slot((slot, "paillier key proof")))
                .await;
            st.verifier
                .verify_dln_proof_1(msg, &peer.h1, &peer.h2, &peer.ntilde, barrier.slot((slot, "dln proof 1")))
                .await;
            st.verifier
                .verify_dln_proof_2(msg, &peer.h2, &peer.h1, &peer.ntilde, barrier.slot((slot, "dln proof 2")))
                .await;
            st.verifier
                .verify_mod_proof(msg, &peer.paillier_n, barrier.slot((slot, "mod proof")))
                .await;
            st.verifier
                .verify_mod_proof_tilde(msg, &peer.ntilde, barrier.slot((slot, "mod proof tilde")))
                .await;
        }
        for (slot, check) in barrier.wait().await {
            culprits.blame(slot, format!("{} verification failed", check));
        }
        Ok(())
    }

    /// Open every old party's commitment and check the share it sent us
    fn collect_shares(&self, culprits: &mut Culprits) -> Result<(Scalar, Vec<Vs>)> {
        let st = &self.state;
        let threshold = st.params.new_threshold();
        let own_id = scalar_from_bigint(&st.params.party_id().key_int())?;

        let mut new_xi = Scalar::ZERO;
        let mut polys = Vec::with_capacity(st.old_count());
        for j in 0..st.old_count() {
            let commitment = received(&st.temp.r1_messages, j, 4)?.unmarshal_v_commitment();
            let decommit = received(&st.temp.r3_messages2, j, 4)?.unmarshal_v_decommitment();
            let cmt = HashCommitDecommit::from_parts(commitment, decommit);
            let Some(flat) = cmt.decommit() else {
                culprits.blame(j, "de-commitment does not open the round 1 commitment");
                continue;
            };
            if flat.len() != (threshold + 1) * 2 {
                culprits.blame(j, format!("de-commitment holds {} coordinates", flat.len()));
                continue;
            }
            let vs = match unflatten_points(flat) {
                Ok(vs) => vs,
                Err(e) => {
                    culprits.blame(j, format!("de-committed points are invalid: {}", e));
                    continue;
                }
            };
            let share = match received(&st.temp.r3_messages1, j, 4)?.unmarshal_share() {
                Ok(share) => share,
                Err(e) => {
                    culprits.blame(j, format!("share is invalid: {}", e));
                    continue;
                }
            };
            let share = Share {
                threshold,
                id: own_id,
                share,
            };
            if !share.verify(threshold, &vs) {
                culprits.blame(j, "vss share verification failed");
                continue;
            }
            new_xi += share.share;
            polys.push(vs);
        }
        Ok((new_xi, polys))
    }
}

#[async_trait]
impl Round<ResharingContent> for Round4 {
    fn round_number(&self) -> u32 {
        4
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(4, "round already started", Vec::new()));
        }
        self.started = true;
        if !self.state.params.is_new_committee() {
            return Ok(());
        }

        let mut culprits = Culprits::new();
        self.verify_new_peers(&mut culprits).await?;
        let (new_xi, polys) = self.collect_shares(&mut culprits)?;
        let everyone = self.state.params.old_and_new_parties();
        culprits.into_result(TASK_NAME, 4, self.state.party_id(), &everyone)?;

        let st = &mut self.state;
        let i = st.new_i()?;

        // keep every new peer's public parameters
        let mut peers = Vec::with_capacity(st.new_count());
        for j in (0..st.new_count()).filter(|&j| j != i) {
            let msg = received(&st.temp.r2_messages1, j, 4)?;
            peers.push((
                j,
                msg.unmarshal_paillier_pk(),
                msg.unmarshal_n_tilde(),
                msg.unmarshal_h1(),
                msg.unmarshal_h2(),
            ));
        }
        let save = st.new_key_mut()?;
        for (j, pk, ntilde, h1, h2) in peers {
            save.paillier_pks[j] = pk;
            save.ntilde_j[j] = ntilde;
            save.h1_j[j] = h1;
            save.h2_j[j] = h2;
        }
        let (ecdsa_pub, ks) = (save.ecdsa_pub, save.ks.clone());

        let threshold = st.params.new_threshold();
        let mut vc = vec![ProjectivePoint::IDENTITY; threshold + 1];
        for vs in &polys {
            for (c, v) in vs.iter().enumerate() {
                vc[c] += v;
            }
        }
        if vc[0] != ecdsa_pub {
            return Err(st.wrap_error(4, "reshared polynomial does not commit to the group key", Vec::new()));
        }

        let mut new_big_xjs = Vec::with_capacity(st.new_count());
        for key in &ks {
            let kj = scalar_from_bigint(key)?;
            let mut big_xj = vc[0];
            let mut z = Scalar::ONE;
            for v in &vc[1..] {
                z *= kj;
                big_xj += *v * z;
            }
            new_big_xjs.push(big_xj);
        }
        if new_big_xjs.get(i) != Some(&(ProjectivePoint::GENERATOR * new_xi)) {
            return Err(st.wrap_error(4, "new share does not match the reshared polynomial", Vec::new()));
        }
        st.temp.new_xi = new_xi;
        st.temp.new_big_xjs = new_big_xjs;
        debug!(party = %st.party_id(), "new share derived");

        // no-small-factor proofs under each receiver's parameters
        let key = st.new_key()?;
        let receivers: Vec<(usize, BigInt, BigInt, BigInt)> = (0..st.new_count())
            .filter(|&j| j != i)
            .map(|j| (j, key.ntilde_j[j].clone(), key.h1_j[j].clone(), key.h2_j[j].clone()))
            .collect();
        let pre = key.pre_params.clone();
        let proofs = run_blocking("round 4 factor proofs", move || {
            let mut rng = OsRng;
            let ntilde_sk = pre.ntilde_private_key();
            let mut proofs = Vec::with_capacity(receivers.len());
            for (j, ntilde_j, h1_j, h2_j) in &receivers {
                let factor_proof = pre.paillier_sk.factor_proof(&mut rng, ntilde_j, h1_j, h2_j)?;
                let factor_proof_tilde = ntilde_sk.factor_proof(&mut rng, ntilde_j, h1_j, h2_j)?;
                proofs.push((*j, DgRound4Message1::new(&factor_proof, &factor_proof_tilde)));
            }
            Ok(proofs)
        })
        .await?;

        let new_ids = st.params.new_parties().ids();
        for (j, msg) in proofs {
            st.send_to(&new_ids[j], ResharingContent::Round4Proofs(msg))?;
        }
        st.broadcast_to_all(ResharingContent::Round4Ack(DgRound4Message2::default()))
    }

    fn can_accept(&self, msg: &Message<ResharingContent>) -> bool {
        match msg.content {
            ResharingContent::Round4Proofs(_) => !msg.is_broadcast(),
            ResharingContent::Round4Ack(_) => msg.is_broadcast(),
            _ => false,
        }
    }

    fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        Ok(self.waiting_for().is_empty())
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        let st = &self.state;
        let mut waiting = st.missing_new(&st.temp.r4_messages2);
        if st.params.is_new_committee() {
            for p in st.missing_new(&st.temp.r4_messages1) {
                if !waiting.contains(&p) {
                    waiting.push(p);
                }
            }
        }
        waiting
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        Some(Box::new(Round5::new(self.state)))
    }
}
