//! Three-round threshold ECDSA key generation
//!
//! 1. Broadcast a commitment to the VSS polynomial, the Paillier modulus and
//!    the auxiliary parameters with their proofs.
//! 2. Check every peer's round 1, then send shares with factor proofs P2P and
//!    broadcast the decommitment.
//! 3. Verify shares and factor proofs, derive the group key, broadcast a
//!    Paillier key proof; once every peer's proof checks out, emit save data.

mod local_party;
mod messages;
mod round_1;
mod round_2;
mod round_3;

pub use local_party::{generate_pre_params, LocalParty};
pub use messages::{KeygenContent, KgRound1Message, KgRound2Message1, KgRound2Message2, KgRound3Message};

use concord_core::vss::{Share, Vs};
use concord_core::{HashCommitment, HashDeCommitment};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::config::Parameters;
use crate::error::{Result, RoundError, TssError};
use crate::message::{Message, MessageRouting};
use crate::party::PartyId;
use crate::round::store_once;
use crate::save_data::LocalPartySaveData;
use crate::verifier::ProofVerifier;

pub(crate) const TASK_NAME: &str = "ecdsa-keygen";

/// Received messages and intermediate values, indexed by party position
pub(crate) struct KeygenTemp {
    pub r1_messages: Vec<Option<KgRound1Message>>,
    pub r2_shares: Vec<Option<KgRound2Message1>>,
    pub r2_decommits: Vec<Option<KgRound2Message2>>,
    pub r3_messages: Vec<Option<KgRound3Message>>,
    pub vs: Vs,
    pub shares: Vec<Share>,
    pub de_commit_poly_g: HashDeCommitment,
    pub kgcs: Vec<HashCommitment>,
}

/// State handed from each keygen round to the next
pub(crate) struct KeygenState {
    pub params: Parameters,
    pub verifier: ProofVerifier,
    pub save: LocalPartySaveData,
    pub temp: KeygenTemp,
    pub ok: Vec<bool>,
    out: UnboundedSender<Message<KeygenContent>>,
    end: UnboundedSender<LocalPartySaveData>,
}

impl KeygenState {
    pub fn new(
        params: Parameters,
        verifier: ProofVerifier,
        save: LocalPartySaveData,
        out: UnboundedSender<Message<KeygenContent>>,
        end: UnboundedSender<LocalPartySaveData>,
    ) -> Self {
        let n = params.party_count();
        Self {
            params,
            verifier,
            save,
            temp: KeygenTemp {
                r1_messages: vec![None; n],
                r2_shares: vec![None; n],
                r2_decommits: vec![None; n],
                r3_messages: vec![None; n],
                vs: Vec::new(),
                shares: Vec::new(),
                de_commit_poly_g: Vec::new(),
                kgcs: vec![HashCommitment::default(); n],
            },
            ok: vec![false; n],
            out,
            end,
        }
    }

    pub fn party_id(&self) -> &PartyId {
        self.params.party_id()
    }

    /// Own position in the committee
    pub fn i(&self) -> usize {
        self.params.party_id().slot()
    }

    pub fn party_count(&self) -> usize {
        self.params.party_count()
    }

    pub fn reset_ok(&mut self) {
        self.ok.iter_mut().for_each(|ok| *ok = false);
    }

    pub fn wrap_error(&self, round: u32, cause: impl Into<String>, culprits: Vec<PartyId>) -> TssError {
        RoundError::new(cause, TASK_NAME, round, Some(self.party_id().clone()), culprits).into()
    }

    pub fn broadcast(&self, content: KeygenContent) -> Result<()> {
        self.send(Message::new(MessageRouting::broadcast(self.party_id()), content))
    }

    pub fn send_to(&self, to: &PartyId, content: KeygenContent) -> Result<()> {
        self.send(Message::new(MessageRouting::p2p(self.party_id(), to), content))
    }

    fn send(&self, msg: Message<KeygenContent>) -> Result<()> {
        self.out
            .send(msg)
            .map_err(|_| TssError::InvalidState("outgoing message channel closed".to_string()))
    }

    pub fn finish(&self) -> Result<()> {
        self.end
            .send(self.save.clone())
            .map_err(|_| TssError::InvalidState("save data channel closed".to_string()))
    }

    /// File a message under its sender's position
    pub fn store_message(&mut self, msg: Message<KeygenContent>) -> Result<()> {
        let from = msg.from().clone();
        let j = from.slot();
        if self.params.parties().ids().get(j).map(|p| &p.key) != Some(&from.key) {
            return Err(TssError::MalformedMessage(format!(
                "sender {} is not at that position in the committee",
                from
            )));
        }
        if msg.content.expects_broadcast() != msg.is_broadcast() {
            return Err(TssError::MalformedMessage(format!(
                "{} from {} has the wrong broadcast flag",
                msg.type_name(),
                from
            )));
        }
        let filled = match msg.content {
            KeygenContent::Round1(m) => store_once(&mut self.temp.r1_messages[j], m),
            KeygenContent::Round2Share(m) => store_once(&mut self.temp.r2_shares[j], m),
            KeygenContent::Round2DeCommit(m) => store_once(&mut self.temp.r2_decommits[j], m),
            KeygenContent::Round3(m) => store_once(&mut self.temp.r3_messages[j], m),
        };
        if !filled {
            warn!(party = %self.party_id(), from = %from, "duplicate message dropped");
        }
        Ok(())
    }

    /// Parties whose slot in `messages` is still empty
    pub fn missing<T>(&self, messages: &[Option<T>], skip_self: bool) -> Vec<PartyId> {
        let i = self.i();
        self.params
            .parties()
            .ids()
            .iter()
            .zip(messages)
            .filter(|(p, m)| m.is_none() && !(skip_self && p.slot() == i))
            .map(|(p, _)| p.clone())
            .collect()
    }
}
