use async_trait::async_trait;
use concord_core::ec::point_to_bytes;
use tracing::info;

use super::{ResharingContent, ResharingState};
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::Round;

pub(crate) struct Round6 {
    state: ResharingState,
    started: bool,
}

impl Round6 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }
}

#[async_trait]
impl Round<ResharingContent> for Round6 {
    fn round_number(&self) -> u32 {
        6
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(6, "round already started", Vec::new()));
        }
        self.started = true;

        let st = &mut self.state;
        if let Some(new_key) = st.new_key.as_mut() {
            new_key.xi = st.temp.new_xi;
            new_key.big_xj = std::mem::take(&mut st.temp.new_big_xjs);
            info!(
                party = %st.params.party_id(),
                committee = ?st.params.committee(),
                ecdsa_pub = %hex::encode(point_to_bytes(&new_key.ecdsa_pub)),
                "resharing complete"
            );
        } else {
            info!(party = %st.params.party_id(), committee = ?st.params.committee(), "share handed over");
        }
        st.finish()
    }

    fn can_accept(&self, _msg: &Message<ResharingContent>) -> bool {
        false
    }

    fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        Vec::new()
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        None
    }
}
