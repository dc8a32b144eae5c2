use async_trait::async_trait;
use concord_core::ec::flatten_points;
use concord_core::{vss, DlnProof, HashCommitDecommit, ModProof, ParamProof};
use k256::elliptic_curve::Field;
use k256::Scalar;
use rand::rngs::OsRng;
use tracing::debug;

use super::round_2::Round2;
use super::{KeygenContent, KeygenState, KgRound1Message};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{run_blocking, Round};
use crate::save_data::LocalPreParams;

pub(crate) struct Round1 {
    state: KeygenState,
    started: bool,
}

impl Round1 {
    pub fn new(state: KeygenState) -> Self {
        Self {
            state,
            started: false,
        }
    }
}

/// DLN proofs in both directions, the ring-Pedersen parameter proof and the
/// Paillier modulus proof
fn prove_parameters(pre: &LocalPreParams) -> Result<(DlnProof, DlnProof, ParamProof, ModProof)> {
    let mut rng = OsRng;
    let dln_proof_1 = DlnProof::prove(&mut rng, &pre.h1, &pre.h2, &pre.alpha, &pre.p, &pre.q, &pre.ntilde)?;
    let dln_proof_2 = DlnProof::prove(&mut rng, &pre.h2, &pre.h1, &pre.beta, &pre.p, &pre.q, &pre.ntilde)?;
    let param_proof = pre
        .ntilde_private_key()
        .param_proof(&mut rng, &pre.h2, &pre.h1, &pre.alpha)?;
    let mod_proof = pre.paillier_sk.mod_proof(&mut rng)?;
    Ok((dln_proof_1, dln_proof_2, param_proof, mod_proof))
}

#[async_trait]
impl Round<KeygenContent> for Round1 {
    fn round_number(&self) -> u32 {
        1
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(1, "round already started", Vec::new()));
        }
        self.started = true;
        self.state.reset_ok();

        let st = &mut self.state;
        let i = st.i();
        let mut rng = OsRng;

        // secret contribution and its sharing
        let ui = Scalar::random(&mut rng);
        let ids = st.params.parties().keys();
        let (vs, shares) = vss::create(&mut rng, st.params.threshold(), &ui, &ids)?;
        let cmt = HashCommitDecommit::new(&mut rng, &flatten_points(&vs)?);

        let pre = st.save.pre_params.clone();
        let (dln_proof_1, dln_proof_2, param_proof, mod_proof) =
            run_blocking("round 1 proofs", move || prove_parameters(&pre)).await?;
        debug!("round 1 proofs ready");

        let pre = &st.save.pre_params;
        let msg = KgRound1Message::new(
            &cmt.c,
            &pre.paillier_sk.public_key,
            &pre.ntilde,
            &pre.h1,
            &pre.h2,
            &dln_proof_1,
            &dln_proof_2,
            &param_proof,
            &mod_proof,
        );

        st.save.share_id = st.params.party_id().key_int();
        st.save.ks = ids;
        st.save.ntilde_j[i] = st.save.pre_params.ntilde.clone();
        st.save.h1_j[i] = st.save.pre_params.h1.clone();
        st.save.h2_j[i] = st.save.pre_params.h2.clone();
        st.save.paillier_pks[i] = st.save.pre_params.paillier_sk.public_key.clone();

        st.temp.vs = vs;
        st.temp.shares = shares;
        st.temp.kgcs[i] = cmt.c;
        st.temp.de_commit_poly_g = cmt.d;
        st.temp.r1_messages[i] = Some(msg.clone());

        st.broadcast(KeygenContent::Round1(msg))
    }

    fn can_accept(&self, msg: &Message<KeygenContent>) -> bool {
        matches!(msg.content, KeygenContent::Round1(_)) && msg.is_broadcast()
    }

    fn store_message(&mut self, msg: Message<KeygenContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        for j in 0..self.state.party_count() {
            if self.state.ok[j] {
                continue;
            }
            if self.state.temp.r1_messages[j].is_none() {
                return Ok(false);
            }
            self.state.ok[j] = true;
        }
        Ok(true)
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        self.state.missing(&self.state.temp.r1_messages, false)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<KeygenContent>>> {
        Some(Box::new(Round2::new(self.state)))
    }
}
