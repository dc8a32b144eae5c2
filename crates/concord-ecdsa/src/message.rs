//! Routed protocol messages and their byte encoding

use bitcode::{Decode, DecodeOwned, Encode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::party::PartyId;

/// Protocol-specific message bodies
pub trait MessageContent: Clone + Send + Sync + 'static {
    /// Presence and length checks on every required field
    fn validate_basic(&self) -> bool;

    fn type_name(&self) -> &'static str;
}

/// Who sent a message and who should receive it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct MessageRouting {
    pub from: PartyId,
    /// `None` means every other party
    pub to: Option<Vec<PartyId>>,
    pub is_broadcast: bool,
    pub is_to_old_committee: bool,
    pub is_to_old_and_new_committees: bool,
}

impl MessageRouting {
    pub fn broadcast(from: &PartyId) -> Self {
        Self {
            from: from.clone(),
            to: None,
            is_broadcast: true,
            is_to_old_committee: false,
            is_to_old_and_new_committees: false,
        }
    }

    pub fn broadcast_to(from: &PartyId, to: Vec<PartyId>) -> Self {
        Self {
            to: Some(to),
            ..Self::broadcast(from)
        }
    }

    pub fn p2p(from: &PartyId, to: &PartyId) -> Self {
        Self {
            from: from.clone(),
            to: Some(vec![to.clone()]),
            is_broadcast: false,
            is_to_old_committee: false,
            is_to_old_and_new_committees: false,
        }
    }

    pub fn to_old_committee(mut self) -> Self {
        self.is_to_old_committee = true;
        self
    }

    pub fn to_old_and_new_committees(mut self) -> Self {
        self.is_to_old_and_new_committees = true;
        self
    }
}

/// A routed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<C> {
    pub routing: MessageRouting,
    pub content: C,
}

impl<C: MessageContent> Message<C> {
    pub fn new(routing: MessageRouting, content: C) -> Self {
        Self { routing, content }
    }

    pub fn from(&self) -> &PartyId {
        &self.routing.from
    }

    pub fn is_broadcast(&self) -> bool {
        self.routing.is_broadcast
    }

    pub fn validate_basic(&self) -> bool {
        self.routing.from.validate_basic() && self.content.validate_basic()
    }

    pub fn type_name(&self) -> &'static str {
        self.content.type_name()
    }
}

impl<C: MessageContent + Encode + DecodeOwned> Message<C> {
    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(&(self.routing.clone(), self.content.clone()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (routing, content): (MessageRouting, C) = bitcode::decode(bytes)?;
        Ok(Self { routing, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
    struct Ping(Vec<u8>);

    impl MessageContent for Ping {
        fn validate_basic(&self) -> bool {
            !self.0.is_empty()
        }

        fn type_name(&self) -> &'static str {
            "Ping"
        }
    }

    #[test]
    fn test_message_bytes_roundtrip() {
        let from = PartyId::new("a", "alice", BigInt::from(7));
        let to = PartyId::new("b", "bob", BigInt::from(8));
        let msg = Message::new(MessageRouting::p2p(&from, &to).to_old_committee(), Ping(vec![1, 2]));
        let decoded = Message::<Ping>::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.routing.is_to_old_committee);
        assert!(!decoded.is_broadcast());
    }

    #[test]
    fn test_validate_basic_checks_sender_and_content() {
        let from = PartyId::new("a", "alice", BigInt::from(7));
        assert!(Message::new(MessageRouting::broadcast(&from), Ping(vec![1])).validate_basic());
        assert!(!Message::new(MessageRouting::broadcast(&from), Ping(Vec::new())).validate_basic());
        let nobody = PartyId::new("n", "nobody", BigInt::from(0));
        assert!(!Message::new(MessageRouting::broadcast(&nobody), Ping(vec![1])).validate_basic());
        assert!(Message::<Ping>::from_bytes(&[0xff]).is_err());
    }
}
