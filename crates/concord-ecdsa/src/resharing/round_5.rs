use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroize;

use super::round_6::Round6;
use super::{DgRound5Message, ResharingContent, ResharingState, TASK_NAME};
use crate::culprits::Culprits;
use crate::error::Result;
use crate::message::Message;
use crate::party::PartyId;
use crate::round::{received, Round};
use crate::verifier::JoinBarrier;

pub(crate) struct Round5 {
    state: ResharingState,
    started: bool,
}

impl Round5 {
    pub fn new(state: ResharingState) -> Self {
        Self {
            state,
            started: false,
        }
    }

    async fn verify_factor_proofs(&self) -> Result<()> {
        let st = &self.state;
        let i = st.new_i()?;
        let key = st.new_key()?;
        let pre = &key.pre_params;
        let mut barrier = JoinBarrier::new();
        for j in (0..st.new_count()).filter(|&j| j != i) {
            let msg = received(&st.temp.r4_messages1, j, 5)?;
            st.verifier
                .verify_factor_proof(
                    msg,
                    &key.paillier_pks[j].n,
                    &pre.ntilde,
                    &pre.h1,
                    &pre.h2,
                    barrier.slot((j, "factor proof")),
                )
                .await;
            st.verifier
                .verify_factor_proof_tilde(
                    msg,
                    &key.ntilde_j[j],
                    &pre.ntilde,
                    &pre.h1,
                    &pre.h2,
                    barrier.slot((j, "factor proof tilde")),
                )
                .await;
        }
        let mut culprits = Culprits::new();
        for (j, check) in barrier.wait().await {
            culprits.blame(j, format!("{} verification failed", check));
        }
        culprits.into_result(TASK_NAME, 5, st.party_id(), st.params.new_parties().ids())
    }
}

#[async_trait]
impl Round<ResharingContent> for Round5 {
    fn round_number(&self) -> u32 {
        5
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(self.state.wrap_error(5, "round already started", Vec::new()));
        }
        self.started = true;

        let st = &mut self.state;
        if let Some(old_key) = st.old_key.as_mut() {
            old_key.zeroize();
            st.temp.new_shares.iter_mut().for_each(Zeroize::zeroize);
            debug!(party = %st.params.party_id(), "old share zeroed");
        }
        if !st.params.is_new_committee() {
            return Ok(());
        }

        self.verify_factor_proofs().await?;
        self.state
            .broadcast_to_all(ResharingContent::Round5Ack(DgRound5Message::default()))
    }

    fn can_accept(&self, msg: &Message<ResharingContent>) -> bool {
        matches!(msg.content, ResharingContent::Round5Ack(_)) && msg.is_broadcast()
    }

    fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        self.state.store_message(msg)
    }

    async fn update(&mut self) -> Result<bool> {
        Ok(self.waiting_for().is_empty())
    }

    fn waiting_for(&self) -> Vec<PartyId> {
        self.state.missing_new(&self.state.temp.r5_messages)
    }

    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<ResharingContent>>> {
        Some(Box::new(Round6::new(self.state)))
    }
}
