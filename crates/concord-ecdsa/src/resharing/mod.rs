//! Six-round redistribution of an existing key to a new committee
//!
//! A party may sit in both committees; it then plays both parts, handing
//! over its old share and receiving a new one.
//!
//! 1. Old: Lagrange-weight the share, split it for the new committee and
//!    broadcast the group key with a commitment to the sharing polynomial.
//! 2. New: agree on the group key, broadcast Paillier and auxiliary
//!    parameters with their proofs; acknowledge to the old committee.
//! 3. Old: send shares P2P and open the commitment.
//! 4. New: verify peers' proofs and the received shares, derive the new
//!    share, send no-small-factor proofs P2P; acknowledge to everyone.
//! 5. New: verify the factor proofs and acknowledge. Old: zero the share.
//! 6. Everyone: emit save data, the new key where there is one.

mod local_party;
mod messages;
mod round_1;
mod round_2;
mod round_3;
mod round_4;
mod round_5;
mod round_6;

pub use local_party::{LocalParty, ResharingInput};
pub use messages::{
    DgRound1Message, DgRound2Message1, DgRound2Message2, DgRound3Message1, DgRound3Message2,
    DgRound4Message1, DgRound4Message2, DgRound5Message, ResharingContent,
};

use concord_core::vss::Share;
use concord_core::HashDeCommitment;
use k256::{ProjectivePoint, Scalar};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::config::ReSharingParameters;
use crate::error::{Result, RoundError, TssError};
use crate::message::{Message, MessageContent, MessageRouting};
use crate::party::PartyId;
use crate::round::store_once;
use crate::save_data::LocalPartySaveData;
use crate::verifier::ProofVerifier;

pub(crate) const TASK_NAME: &str = "ecdsa-resharing";

/// Received messages and intermediate values.
///
/// Messages from the old committee are indexed by old position, messages from
/// the new committee by new position.
pub(crate) struct ResharingTemp {
    pub r1_messages: Vec<Option<DgRound1Message>>,
    pub r2_messages1: Vec<Option<DgRound2Message1>>,
    pub r2_messages2: Vec<Option<DgRound2Message2>>,
    pub r3_messages1: Vec<Option<DgRound3Message1>>,
    pub r3_messages2: Vec<Option<DgRound3Message2>>,
    pub r4_messages1: Vec<Option<DgRound4Message1>>,
    pub r4_messages2: Vec<Option<DgRound4Message2>>,
    pub r5_messages: Vec<Option<DgRound5Message>>,
    pub new_shares: Vec<Share>,
    pub v_d: HashDeCommitment,
    pub new_xi: Scalar,
    pub new_big_xjs: Vec<ProjectivePoint>,
}

/// State handed from each resharing round to the next.
///
/// A party in both committees holds both keys until round 5, when the old
/// one is zeroed.
pub(crate) struct ResharingState {
    pub params: ReSharingParameters,
    pub verifier: ProofVerifier,
    /// Old committee: the share being handed over
    pub old_key: Option<LocalPartySaveData>,
    /// New committee: the key being built
    pub new_key: Option<LocalPartySaveData>,
    pub temp: ResharingTemp,
    out: UnboundedSender<Message<ResharingContent>>,
    end: UnboundedSender<LocalPartySaveData>,
}

impl ResharingState {
    pub fn new(
        params: ReSharingParameters,
        verifier: ProofVerifier,
        old_key: Option<LocalPartySaveData>,
        new_key: Option<LocalPartySaveData>,
        out: UnboundedSender<Message<ResharingContent>>,
        end: UnboundedSender<LocalPartySaveData>,
    ) -> Self {
        let old_n = params.old_parties().len();
        let new_n = params.new_parties().len();
        Self {
            params,
            verifier,
            old_key,
            new_key,
            temp: ResharingTemp {
                r1_messages: vec![None; old_n],
                r2_messages1: vec![None; new_n],
                r2_messages2: vec![None; new_n],
                r3_messages1: vec![None; old_n],
                r3_messages2: vec![None; old_n],
                r4_messages1: vec![None; new_n],
                r4_messages2: vec![None; new_n],
                r5_messages: vec![None; new_n],
                new_shares: Vec::new(),
                v_d: Vec::new(),
                new_xi: Scalar::ZERO,
                new_big_xjs: Vec::new(),
            },
            out,
            end,
        }
    }

    pub fn party_id(&self) -> &PartyId {
        self.params.party_id()
    }

    /// Own position in the old committee
    pub fn old_i(&self) -> Result<usize> {
        self.params
            .old_party_id()
            .map(PartyId::slot)
            .ok_or_else(|| TssError::InvalidState("not a member of the old committee".to_string()))
    }

    /// Own position in the new committee
    pub fn new_i(&self) -> Result<usize> {
        self.params
            .new_party_id()
            .map(PartyId::slot)
            .ok_or_else(|| TssError::InvalidState("not a member of the new committee".to_string()))
    }

    pub fn old_count(&self) -> usize {
        self.params.old_parties().len()
    }

    pub fn new_count(&self) -> usize {
        self.params.new_parties().len()
    }

    pub fn old_key(&self) -> Result<&LocalPartySaveData> {
        self.old_key
            .as_ref()
            .ok_or_else(|| TssError::InvalidState("no share to hand over".to_string()))
    }

    pub fn new_key(&self) -> Result<&LocalPartySaveData> {
        self.new_key
            .as_ref()
            .ok_or_else(|| TssError::InvalidState("no key under construction".to_string()))
    }

    pub fn new_key_mut(&mut self) -> Result<&mut LocalPartySaveData> {
        self.new_key
            .as_mut()
            .ok_or_else(|| TssError::InvalidState("no key under construction".to_string()))
    }

    pub fn wrap_error(&self, round: u32, cause: impl Into<String>, culprits: Vec<PartyId>) -> TssError {
        RoundError::new(cause, TASK_NAME, round, Some(self.party_id().clone()), culprits).into()
    }

    /// Our identity in the committee that sends `content`
    fn sender(&self, content: &ResharingContent) -> Result<&PartyId> {
        let id = if content.from_old_committee() {
            self.params.old_party_id()
        } else {
            self.params.new_party_id()
        };
        id.ok_or_else(|| {
            TssError::InvalidState(format!(
                "{} cannot be sent by a member of the {:?} committee",
                content.type_name(),
                self.params.committee()
            ))
        })
    }

    /// Broadcast to the new committee, leaving out ourselves
    pub fn broadcast_to_new(&self, content: ResharingContent) -> Result<()> {
        let from = self.sender(&content)?;
        let to = self.params.new_parties().exclude(from);
        self.send(Message::new(MessageRouting::broadcast_to(from, to), content))
    }

    pub fn broadcast_to_old(&self, content: ResharingContent) -> Result<()> {
        let from = self.sender(&content)?;
        let to = self.params.old_parties().exclude(from);
        self.send(Message::new(
            MessageRouting::broadcast_to(from, to).to_old_committee(),
            content,
        ))
    }

    /// Broadcast to both committees, once per key
    pub fn broadcast_to_all(&self, content: ResharingContent) -> Result<()> {
        let from = self.sender(&content)?;
        let mut to = self.params.old_parties().exclude(from);
        for p in self.params.new_parties().exclude(from) {
            if !to.iter().any(|q| q.key == p.key) {
                to.push(p);
            }
        }
        self.send(Message::new(
            MessageRouting::broadcast_to(from, to).to_old_and_new_committees(),
            content,
        ))
    }

    pub fn send_to(&self, to: &PartyId, content: ResharingContent) -> Result<()> {
        let from = self.sender(&content)?;
        self.send(Message::new(MessageRouting::p2p(from, to), content))
    }

    fn send(&self, msg: Message<ResharingContent>) -> Result<()> {
        self.out
            .send(msg)
            .map_err(|_| TssError::InvalidState("outgoing message channel closed".to_string()))
    }

    /// Hand an old-committee message to our own new-committee role, if we have one
    pub fn deliver_to_self(&mut self, content: ResharingContent) -> Result<()> {
        if !self.params.is_new_committee() {
            return Ok(());
        }
        let from = self.sender(&content)?.clone();
        let routing = if content.expects_broadcast() {
            MessageRouting::broadcast_to(&from, vec![from.clone()])
        } else {
            MessageRouting::p2p(&from, &from)
        };
        self.store_message(Message::new(routing, content))
    }

    /// Emit the new key, or the zeroed old one for a party leaving the committee
    pub fn finish(&self) -> Result<()> {
        let save = match (&self.new_key, &self.old_key) {
            (Some(key), _) | (None, Some(key)) => key.clone(),
            (None, None) => return Err(TssError::InvalidState("no key to save".to_string())),
        };
        self.end
            .send(save)
            .map_err(|_| TssError::InvalidState("save data channel closed".to_string()))
    }

    /// The committee a message of this kind must come from
    pub fn sender_committee(&self, content: &ResharingContent) -> &[PartyId] {
        if content.from_old_committee() {
            self.params.old_parties().ids()
        } else {
            self.params.new_parties().ids()
        }
    }

    /// File a message under its sender's position in the sending committee
    pub fn store_message(&mut self, msg: Message<ResharingContent>) -> Result<()> {
        let from = msg.from().clone();
        let j = from.slot();
        if self.sender_committee(&msg.content).get(j).map(|p| &p.key) != Some(&from.key) {
            return Err(TssError::MalformedMessage(format!(
                "{} from {} does not come from the expected committee",
                msg.type_name(),
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
        let t = &mut self.temp;
        let filled = match msg.content {
            ResharingContent::Round1(m) => store_once(&mut t.r1_messages[j], m),
            ResharingContent::Round2Params(m) => store_once(&mut t.r2_messages1[j], m),
            ResharingContent::Round2Ack(m) => store_once(&mut t.r2_messages2[j], m),
            ResharingContent::Round3Share(m) => store_once(&mut t.r3_messages1[j], m),
            ResharingContent::Round3DeCommit(m) => store_once(&mut t.r3_messages2[j], m),
            ResharingContent::Round4Proofs(m) => store_once(&mut t.r4_messages1[j], m),
            ResharingContent::Round4Ack(m) => store_once(&mut t.r4_messages2[j], m),
            ResharingContent::Round5Ack(m) => store_once(&mut t.r5_messages[j], m),
        };
        if !filled {
            warn!(party = %self.party_id(), from = %from, "duplicate message dropped");
        }
        Ok(())
    }

    /// Old-committee members whose slot in `messages` is still empty
    pub fn missing_old<T>(&self, messages: &[Option<T>]) -> Vec<PartyId> {
        missing_in(self.params.old_parties().ids(), messages, None)
    }

    /// New-committee members whose slot is still empty, not counting ourselves
    pub fn missing_new<T>(&self, messages: &[Option<T>]) -> Vec<PartyId> {
        let own = self.params.new_party_id().map(PartyId::slot);
        missing_in(self.params.new_parties().ids(), messages, own)
    }
}

fn missing_in<T>(committee: &[PartyId], messages: &[Option<T>], skip: Option<usize>) -> Vec<PartyId> {
    committee
        .iter()
        .zip(messages)
        .enumerate()
        .filter(|(j, (_, m))| m.is_none() && Some(*j) != skip)
        .map(|(_, (p, _))| p.clone())
        .collect()
}
