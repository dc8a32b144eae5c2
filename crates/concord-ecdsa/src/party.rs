//! Party identities and their canonical ordering

use std::fmt;

use bitcode::{Decode, Encode};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TssError};

/// A protocol participant.
///
/// `key` is the party's unique scalar identity, big-endian; it is what shares
/// are evaluated at. `index` is the position in the committee after sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct PartyId {
    pub id: String,
    pub moniker: String,
    pub key: Vec<u8>,
    pub index: u32,
}

impl PartyId {
    pub fn new(id: impl Into<String>, moniker: impl Into<String>, key: BigInt) -> Self {
        Self {
            id: id.into(),
            moniker: moniker.into(),
            key: key.to_bytes_be().1,
            index: 0,
        }
    }

    pub fn key_int(&self) -> BigInt {
        BigInt::from_bytes_be(Sign::Plus, &self.key)
    }

    /// Position in the sorted committee
    pub fn slot(&self) -> usize {
        self.index as usize
    }

    pub fn validate_basic(&self) -> bool {
        !self.key.is_empty() && self.key.iter().any(|b| *b != 0)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.index, self.moniker)
    }
}

/// Committee members sorted by key, each carrying its sorted position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedPartyIds(Vec<PartyId>);

impl SortedPartyIds {
    pub fn new(mut ids: Vec<PartyId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(TssError::InvalidParameters("empty party list".to_string()));
        }
        if let Some(bad) = ids.iter().find(|p| !p.validate_basic()) {
            return Err(TssError::InvalidParameters(format!(
                "party {} has an empty key",
                bad.moniker
            )));
        }
        ids.sort_by_key(|p| p.key_int());
        if ids.windows(2).any(|w| w[0].key_int() == w[1].key_int()) {
            return Err(TssError::InvalidParameters("duplicate party key".to_string()));
        }
        for (i, id) in ids.iter_mut().enumerate() {
            id.index = i as u32;
        }
        Ok(Self(ids))
    }

    pub fn ids(&self) -> &[PartyId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> Vec<BigInt> {
        self.0.iter().map(PartyId::key_int).collect()
    }

    /// The committee's copy of `party`, matched by key
    pub fn find_by_key(&self, key: &[u8]) -> Option<&PartyId> {
        self.0.iter().find(|p| p.key == key)
    }

    /// Every member except `party`
    pub fn exclude(&self, party: &PartyId) -> Vec<PartyId> {
        self.0.iter().filter(|p| p.key != party.key).cloned().collect()
    }
}
