use async_trait::async_trait;
use concord_core::DlnProof;
use k256::ProjectivePoint;
use num_bigint::BigInt;
use rand::rngs::OsRng;
use tracing::debug;

use super::round_3::Round3;
use super::{DgRound2Message1, DgRound2Message2, ResharingContent, ResharingState, TASK_NAME};
use crate::culprits::Culprits;
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{received, run_blocking, Round};
use crate::save_data::LocalPreParams;

pub(crate) struct Round2 {
    state: ResharingState,
    started: bool,
}

impl Round2 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }

    /// Every old party must announce the same group key
    fn agree_on_group_key(&mut self) -> Result<()> {
        let st = &mut self.state;
        let mut culprits = Culprits::new();
        let mut agreed = None;
        for j in 0..st.old_count() {
            match received(&st.temp.r1_messages, j, 2)?.unmarshal_ecdsa_pub() {
                Ok(point) => match agreed {
                    None => agreed = Some(point),
                    Some(first) if first != point => {
                        culprits.blame(j, "announced a different group key")
                    }
                    Some(_) => {}
                },
                Err(e) => culprits.blame(j, format!("group key is invalid: {}", e)),
            }
        }
        culprits.into_result(TASK_NAME, 2, st.party_id(), st.params.old_parties().ids())?;
        match agreed {
            Some(point) => {
                st.new_key_mut()?.ecdsa_pub = point;
                Ok(())
            }
            None => Err(st.wrap_error(2, "no group key announced", Vec::new())),
        }
    }
}

/// Paillier key proof, DLN proofs in both directions and modulus proofs for
/// both moduli
fn prove_parameters(pre: &LocalPreParams, own_key: &BigInt, ecdsa_pub: &ProjectivePoint) -> Result<DgRound2Message1> {
    let mut rng = OsRng;
    let key_proof = pre.paillier_sk.key_proof(own_key, ecdsa_pub)?;
    let dln_proof_1 = DlnProof::prove(&mut rng, &pre.h1, &pre.h2, &pre.alpha, &pre.p, &pre.q, &pre.ntilde)?;
    let dln_proof_2 = DlnProof::prove(&mut rng, &pre.h2, &pre.h1, &pre.beta, &pre.p, &pre.q, &pre.ntilde)?;
    let mod_proof = pre.paillier_sk.mod_proof(&mut rng)?;
    let mod_proof_tilde = pre.ntilde_private_key().mod_proof(&mut rng)?;
    Ok(DgRound2Message1::new(
        &pre.paillier_sk.public_key,
        &key_proof,
        &pre.ntilde,
        &pre.h1,
        &pre.h2,
        &dln_proof_1,
        &dln_proof_2,
        &mod_proof,
        &mod_proof_tilde,
    ))
}

#[async_trait]
impl Round<ResharingContent> for Round2 {
    fn round_number(&self) -> u32 {
        2
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(2, "round already started", Vec::new()));
        }
        self.started = true;
        if !self.state.params.is_new_committee() {
            return Ok(());
        }

        self.agree_on_group_key()?;

        let st = &mut self.state;
        let i = st.new_i()?;
        let own_key = st.params.party_id().key_int();
        let ks = st.params.new_parties().keys();
        let key = st.new_key()?;
        let (pre, ecdsa_pub) = (key.pre_params.clone(), key.ecdsa_pub);
        let proof_key = own_key.clone();
        let msg = run_blocking("round 2 proofs", move || prove_parameters(&pre, &proof_key, &ecdsa_pub)).await?;
        debug!(party = %st.party_id(), "round 2 proofs ready");

        let save = st.new_key_mut()?;
        save.share_id = own_key;
        save.ks = ks;
        save.ntilde_j[i] = save.pre_params.ntilde.clone();
        save.h1_j[i] = save.pre_params.h1.clone();
        save.h2_j[i] = save.pre_params.h2.clone();
        save.paillier_pks[i] = save.pre_params.paillier_sk.public_key.clone();

        st.broadcast_to_new(ResharingContent::Round2Params(msg))?;
        st.broadcast_to_old(ResharingContent::Round2Ack(DgRound2Message2::default()))
    }

    fn can_accept(&self, msg: &Message<ResharingContent>) -> bool {
        matches!(
            msg.content,
            ResharingContent::Round2Params(_) | ResharingContent::Round2Ack(_)
        ) && msg.is_broadcast()
    }

    fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        Ok(self.waiting_for().is_empty())
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        let st = &self.state;
        let mut waiting = Vec::new();
        if st.params.is_old_committee() {
            waiting = st.missing_new(&st.temp.r2_messages2);
        }
        if st.params.is_new_committee() {
            for p in st.missing_new(&st.temp.r2_messages1) {
                if !waiting.contains(&p) {
                    waiting.push(p);
                }
            }
        }
        waiting
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        Some(Box::new(Round3::new(self.state)))
    }
}
