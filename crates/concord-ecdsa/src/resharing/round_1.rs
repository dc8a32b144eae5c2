use async_trait::async_trait;
use concord_core::ec::flatten_points;
use concord_core::vss::{self, check_indexes, lagrange_coefficient};
use concord_core::HashCommitDecommit;
use k256::ProjectivePoint;
use rand::rngs::OsRng;
use tracing::debug;

use super::round_2::Round2;
use super::{DgRound1Message, ResharingContent, ResharingState};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::Round;

pub(crate) struct Round1 {
    state: ResharingState,
    started: bool,
}

impl Round1 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }
}

#[async_trait]
impl Round<ResharingContent> for Round1 {
    fn round_number(&self) -> u32 {
        1
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(1, "round already started", Vec::new()));
        }
        self.started = true;

        let st = &mut self.state;
        if !st.params.is_old_committee() {
            return Ok(());
        }
        let i = st.old_i()?;
        let mut rng = OsRng;

        let old = st.old_key()?;
        let (xi, ecdsa_pub) = (old.xi, old.ecdsa_pub);
        if old.big_xj.get(i) != Some(&(ProjectivePoint::GENERATOR * xi)) {
            return Err(st.wrap_error(1, "stored share does not match its public commitment", Vec::new()));
        }

        let old_ids = check_indexes(&st.params.old_parties().keys())?;
        let wi = xi * lagrange_coefficient(i, &old_ids)?;
        let new_keys = st.params.new_parties().keys();
        let (vs, shares) = vss::create(&mut rng, st.params.new_threshold(), &wi, &new_keys)?;
        let cmt = HashCommitDecommit::new(&mut rng, &flatten_points(&vs)?);
        debug!(party = %st.party_id(), new_parties = new_keys.len(), "weighted share split");

        st.temp.new_shares = shares;
        st.temp.v_d = cmt.d;

        let msg = DgRound1Message::new(&ecdsa_pub, &cmt.c);
        st.deliver_to_self(ResharingContent::Round1(msg.clone()))?;
        st.broadcast_to_new(ResharingContent::Round1(msg))
    }

    fn can_accept(&self, msg: &Message<ResharingContent>) -> bool {
        matches!(msg.content, ResharingContent::Round1(_)) && msg.is_broadcast()
    }

    fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        Ok(self.waiting_for().is_empty())
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        if !self.state.params.is_new_committee() {
            return Vec::new();
        }
        self.state.missing_old(&self.state.temp.r1_messages)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        Some(Box::new(Round2::new(self.state)))
    }
}
