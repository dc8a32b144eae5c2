use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

use super::round_1::Round1;
use super::{ResharingContent, ResharingState, TASK_NAME};
use crate::config::{Committee, ReSharingParameters};
use crate::error::{Result, RoundError, TssError};
use crate::message::Message;
use crate::party::PartyId;
use crate::round::BaseParty;
use crate::save_data::{LocalPartySaveData, LocalPreParams};
use crate::verifier::ProofVerifier;

/// What a party brings to a resharing run
#[derive(Debug, Clone)]
pub enum ResharingInput {
    /// Old committee: the key from a previous key generation or resharing
    Old(LocalPartySaveData),
    /// New committee: freshly generated pre-params
    New(LocalPreParams),
    /// Both committees: the current key and fresh pre-params for the new one
    Both(LocalPartySaveData, LocalPreParams),
}

/// One participant in a resharing run, on either committee or both.
///
/// Parties leaving the committee end with a zeroed share; new-committee
/// parties end with a share of the same group key under the new threshold.
pub struct LocalParty {
    params: ReSharingParameters,
    base: BaseParty<ResharingContent>,
}

impl LocalParty {
    pub fn new(
        params: ReSharingParameters,
        input: ResharingInput,
        out: UnboundedSender<Message<ResharingContent>>,
        end: UnboundedSender<LocalPartySaveData>,
    ) -> Result<Self> {
        let (old_key, new_key) = match (input, params.committee()) {
            (ResharingInput::Old(key), Committee::Old) => (Some(key.subset(&params.old_parties().keys())?), None),
            (ResharingInput::New(pre_params), Committee::New) => (None, Some(fresh_key(&params, pre_params)?)),
            (ResharingInput::Both(key, pre_params), Committee::Both) => (
                Some(key.subset(&params.old_parties().keys())?),
                Some(fresh_key(&params, pre_params)?),
            ),
            (_, committee) => {
                return Err(TssError::InvalidParameters(format!(
                    "input does not match membership of the {:?} committee",
                    committee
                )))
            }
        };
        let verifier = ProofVerifier::new(params.config().concurrency)?;
        let state = ResharingState::new(params.clone(), verifier, old_key, new_key, out, end);
        let base = BaseParty::new(TASK_NAME, params.party_id().clone(), Box::new(Round1::new(state)));
        Ok(Self { params, base })
    }

    #[instrument(skip(self), fields(party = %self.params.party_id()))]
    pub async fn start(&mut self) -> Result<()> {
        info!(
            committee = ?self.params.committee(),
            old_threshold = self.params.old_threshold(),
            new_threshold = self.params.new_threshold(),
            "starting resharing"
        );
        self.base.start().await
    }

    /// Feed one inbound message; returns `Ok(true)` when it was processed
    #[instrument(skip(self, msg), fields(party = %self.params.party_id(), kind = msg.type_name()))]
    pub async fn update(&mut self, msg: Message<ResharingContent>) -> Result<bool> {
        self.validate_message(&msg)?;
        self.base.update(msg).await
    }

    pub async fn update_from_bytes(&mut self, bytes: &[u8]) -> Result<bool> {
        let msg = Message::from_bytes(bytes)?;
        self.update(msg).await
    }

    fn validate_message(&self, msg: &Message<ResharingContent>) -> Result<()> {
        let from = msg.from();
        let committee = if msg.content.from_old_committee() {
            self.params.old_parties()
        } else {
            self.params.new_parties()
        };
        if from.slot() >= committee.len() {
            return Err(TssError::MalformedMessage(format!(
                "sender index {} is outside the sending committee",
                from.index
            )));
        }
        if !msg.validate_basic() {
            warn!(from = %from, kind = msg.type_name(), "message failed basic validation");
            return Err(RoundError::new(
                format!("{} failed basic validation", msg.type_name()),
                TASK_NAME,
                self.base.round_number().unwrap_or(0),
                Some(self.params.party_id().clone()),
                vec![from.clone()],
            )
            .into());
        }
        Ok(())
    }

    pub fn party_id(&self) -> &PartyId {
        self.params.party_id()
    }

    pub fn round_number(&self) -> Option<u32> {
        self.base.round_number()
    }

    pub fn waiting_for(&self) -> Vec<PartyId> {
        self.base.waiting_for()
    }

    pub fn is_running(&self) -> bool {
        self.base.is_running()
    }
}

/// Empty save data for the new committee, built on checked pre-params
fn fresh_key(params: &ReSharingParameters, pre_params: LocalPreParams) -> Result<LocalPartySaveData> {
    if !pre_params.validate_with_proof() {
        return Err(TssError::InvalidParameters("pre-params are incomplete".to_string()));
    }
    let bits = params.config().paillier_modulus_bits;
    if pre_params.paillier_sk.n().bits() as usize != bits || pre_params.ntilde.bits() as usize != bits {
        return Err(TssError::InvalidParameters(format!(
            "pre-params were not generated for {}-bit moduli",
            bits
        )));
    }
    Ok(LocalPartySaveData::new(pre_params, params.new_parties().len()))
}
