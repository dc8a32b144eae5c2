use async_trait::async_trait;
use concord_core::ec::{point_to_bytes, scalar_from_bigint, unflatten_points};
use concord_core::vss::{Share, Vs};
use concord_core::HashCommitDecommit;
use k256::{ProjectivePoint, Scalar};
use tracing::{debug, info};

use super::{KeygenContent, KeygenState, KgRound3Message};
use crate::culprits::Culprits;
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{received, Round};
use crate::verifier::JoinBarrier;

pub(crate) struct Round3 {
    state: KeygenState,
    started: bool,
}

impl Round3 {
    pub fn new(state: KeygenState) -> Self {
        Self {
            state,
            started: false,
        }
    }

    /// Open every peer's commitment and check the share it sent against it
    fn collect_shares(&self, culprits: &mut Culprits) -> Result<(Scalar, Vec<Vs>)> {
        let st = &self.state;
        let i = st.i();
        let threshold = st.params.threshold();
        let own_id = scalar_from_bigint(&st.params.party_id().key_int())?;

        let mut xi = st.temp.shares[i].share;
        let mut polys = Vec::with_capacity(st.party_count());
        for j in 0..st.party_count() {
            if j == i {
                polys.push(st.temp.vs.clone());
                continue;
            }
            let decommit = received(&st.temp.r2_decommits, j, 3)?;
            let cmt = HashCommitDecommit::from_parts(st.temp.kgcs[j].clone(), decommit.unmarshal_de_commitment());
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
            let share = match received(&st.temp.r2_shares, j, 3)?.unmarshal_share() {
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
            xi += share.share;
            polys.push(vs);
        }
        Ok((xi, polys))
    }

    async fn verify_factor_proofs(&self, culprits: &mut Culprits) -> Result<()> {
        let st = &self.state;
        let i = st.i();
        let pre = &st.save.pre_params;
        let mut barrier = JoinBarrier::new();
        for j in (0..st.party_count()).filter(|&j| j != i) {
            let msg = received(&st.temp.r2_shares, j, 3)?;
            st.verifier
                .verify_factor_proof(
                    msg,
                    &st.save.paillier_pks[j].n,
                    &pre.ntilde,
                    &pre.h1,
                    &pre.h2,
                    barrier.slot(j),
                )
                .await;
        }
        for j in barrier.wait().await {
            culprits.blame(j, "factor proof verification failed");
        }
        Ok(())
    }
}

#[async_trait]
impl Round<KeygenContent> for Round3 {
    fn round_number(&self) -> u32 {
        3
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(3, "round already started", Vec::new()));
        }
        self.started = true;
        self.state.reset_ok();

        let mut culprits = Culprits::new();
        let (xi, polys) = self.collect_shares(&mut culprits)?;
        self.verify_factor_proofs(&mut culprits).await?;
        let st = &mut self.state;
        culprits.into_result(super::TASK_NAME, 3, st.party_id(), st.params.parties().ids())?;

        // group polynomial commitment
        let threshold = st.params.threshold();
        let mut vc = vec![ProjectivePoint::IDENTITY; threshold + 1];
        for vs in &polys {
            for (c, v) in vs.iter().enumerate() {
                vc[c] += v;
            }
        }
        let ecdsa_pub = vc[0];

        for j in 0..st.party_count() {
            let kj = scalar_from_bigint(&st.save.ks[j])?;
            let mut big_xj = vc[0];
            let mut z = Scalar::ONE;
            for v in &vc[1..] {
                z *= kj;
                big_xj += *v * z;
            }
            st.save.big_xj[j] = big_xj;
        }

        let i = st.i();
        if ProjectivePoint::GENERATOR * xi != st.save.big_xj[i] {
            return Err(st.wrap_error(3, "own share does not match the group polynomial", Vec::new()));
        }
        st.save.xi = xi;
        st.save.ecdsa_pub = ecdsa_pub;
        debug!(party = %st.party_id(), "group key derived");

        let proof = st
            .save
            .pre_params
            .paillier_sk
            .key_proof(&st.params.party_id().key_int(), &ecdsa_pub)?;
        let msg = KgRound3Message::new(&proof);
        st.temp.r3_messages[i] = Some(msg.clone());
        st.broadcast(KeygenContent::Round3(msg))
    }

    fn can_accept(&self, msg: &Message<KeygenContent>) -> bool {
        matches!(msg.content, KeygenContent::Round3(_)) && msg.is_broadcast()
    }

    fn store_message(&mut self, msg: Message<KeygenContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        let st = &self.state;
        if st.temp.r3_messages.iter().any(Option::is_none) {
            return Ok(false);
        }
        if st.ok.iter().all(|ok| *ok) {
            return Ok(true);
        }

        let i = st.i();
        let mut barrier = JoinBarrier::new();
        for j in (0..st.party_count()).filter(|&j| j != i) {
            let msg = received(&st.temp.r3_messages, j, 3)?;
            st.verifier
                .verify_key_proof(
                    msg,
                    &st.save.paillier_pks[j].n,
                    &st.save.ks[j],
                    &st.save.ecdsa_pub,
                    barrier.slot(j),
                )
                .await;
        }
        let mut culprits = Culprits::new();
        for j in barrier.wait().await {
            culprits.blame(j, "paillier key proof verification failed");
        }
        culprits.into_result(super::TASK_NAME, 3, st.party_id(), st.params.parties().ids())?;

        self.state.ok.iter_mut().for_each(|ok| *ok = true);
        info!(
            party = %self.state.party_id(),
            ecdsa_pub = %hex::encode(point_to_bytes(&self.state.save.ecdsa_pub)),
            "key generation complete"
        );
        self.state.finish()?;
        Ok(true)
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        self.state.missing(&self.state.temp.r3_messages, false)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<KeygenContent>>> {
        None
    }
}
