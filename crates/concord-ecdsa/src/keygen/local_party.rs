use concord_core::prime::GenerationContext;
use rand::rngs::OsRng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

use super::round_1::Round1;
use super::{KeygenContent, KeygenState, TASK_NAME};
use crate::config::{Parameters, ProtocolConfig};
use crate::error::{Result, RoundError, TssError};
use crate::message::Message;
use crate::party::PartyId;
use crate::round::BaseParty;
use crate::save_data::{LocalPartySaveData, LocalPreParams};
use crate::verifier::ProofVerifier;

/// One participant in a key generation run.
///
/// Outgoing messages go to `out`; the finished [`LocalPartySaveData`] is sent
/// once on `end`.
pub struct LocalParty {
    params: Parameters,
    base: BaseParty<KeygenContent>,
}

impl LocalParty {
    pub fn new(
        params: Parameters,
        pre_params: LocalPreParams,
        out: UnboundedSender<Message<KeygenContent>>,
        end: UnboundedSender<LocalPartySaveData>,
    ) -> Result<Self> {
        if !pre_params.validate_with_proof() {
            return Err(TssError::InvalidParameters(
                "pre-params are incomplete".to_string(),
            ));
        }
        let bits = params.config().paillier_modulus_bits;
        if pre_params.paillier_sk.n().bits() as usize != bits || pre_params.ntilde.bits() as usize != bits {
            return Err(TssError::InvalidParameters(format!(
                "pre-params were not generated for {}-bit moduli",
                bits
            )));
        }
        let verifier = ProofVerifier::new(params.config().concurrency)?;
        let save = LocalPartySaveData::new(pre_params, params.party_count());
        let state = KeygenState::new(params.clone(), verifier, save, out, end);
        let base = BaseParty::new(TASK_NAME, params.party_id().clone(), Box::new(Round1::new(state)));
        Ok(Self { params, base })
    }

    #[instrument(skip(self), fields(party = %self.params.party_id()))]
    pub async fn start(&mut self) -> Result<()> {
        info!(
            parties = self.params.party_count(),
            threshold = self.params.threshold(),
            "starting key generation"
        );
        self.base.start().await
    }

    /// Feed one inbound message; returns `Ok(true)` when it was processed
    #[instrument(skip(self, msg), fields(party = %self.params.party_id(), kind = msg.type_name()))]
    pub async fn update(&mut self, msg: Message<KeygenContent>) -> Result<bool> {
        self.validate_message(&msg)?;
        self.base.update(msg).await
    }

    pub async fn update_from_bytes(&mut self, bytes: &[u8]) -> Result<bool> {
        let msg = Message::from_bytes(bytes)?;
        self.update(msg).await
    }

    fn validate_message(&self, msg: &Message<KeygenContent>) -> Result<()> {
        let from = msg.from();
        if from.slot() >= self.params.party_count() {
            return Err(TssError::MalformedMessage(format!(
                "sender index {} is outside the committee",
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

/// Generate pre-params for `config` on the blocking pool, bounded by its timeout
pub async fn generate_pre_params(config: &ProtocolConfig) -> Result<LocalPreParams> {
    config.validate()?;
    let bits = config.paillier_modulus_bits;
    let ctx = GenerationContext::with_timeout(config.pre_params_timeout());
    let started = std::time::Instant::now();
    let pre_params = tokio::task::spawn_blocking(move || LocalPreParams::generate(&mut OsRng, bits, &ctx))
        .await
        .map_err(|e| TssError::InvalidState(format!("pre-params task failed: {}", e)))??;
    info!(bits, elapsed_ms = started.elapsed().as_millis() as u64, "pre-params ready");
    Ok(pre_params)
}
