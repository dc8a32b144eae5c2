use async_trait::async_trait;

use super::round_4::Round4;
use super::{DgRound3Message1, DgRound3Message2, ResharingContent, ResharingState};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::Round;

pub(crate) struct Round3 {
    state: ResharingState,
    started: bool,
}

impl Round3 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }
}

#[async_trait]
impl Round<ResharingContent> for Round3 {
    fn round_number(&self) -> u32 {
        3
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(3, "round already started", Vec::new()));
        }
        self.started = true;

        let st = &mut self.state;
        if !st.params.is_old_committee() {
            return Ok(());
        }
        let own_key = st.params.new_party_id().map(|p| p.key.clone());
        let mut own_share = None;
        for (pj, share) in st.params.new_parties().ids().iter().zip(&st.temp.new_shares) {
            let content = ResharingContent::Round3Share(DgRound3Message1::new(&share.share));
            if own_key.as_ref() == Some(&pj.key) {
                own_share = Some(content);
            } else {
                st.send_to(pj, content)?;
            }
        }
        if let Some(content) = own_share {
            st.deliver_to_self(content)?;
        }

        let decommit = ResharingContent::Round3DeCommit(DgRound3Message2::new(&st.temp.v_d));
        st.deliver_to_self(decommit.clone())?;
        st.broadcast_to_new(decommit)
    }

    fn can_accept(&self, msg: &Message<ResharingContent>) -> bool {
        match msg.content {
            ResharingContent::Round3Share(_) => !msg.is_broadcast(),
            ResharingContent::Round3DeCommit(_) => msg.is_broadcast(),
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
        if !st.params.is_new_committee() {
            return Vec::new();
        }
        let mut waiting = st.missing_old(&st.temp.r3_messages1);
        for p in st.missing_old(&st.temp.r3_messages2) {
            if !waiting.contains(&p) {
                waiting.push(p);
            }
        }
        waiting
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        Some(Box::new(Round4::new(self.state)))
    }
}
