//! Protocol configuration and validated party parameters

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TssError};
use crate::party::{PartyId, SortedPartyIds};

/// Smallest Paillier modulus accepted outside of tests
pub const MIN_MODULUS_BITS: usize = 512;

/// Tunables shared by key generation and resharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Width of the proof verifier's admission gate
    pub concurrency: usize,

    /// Bit length of Paillier and auxiliary moduli
    pub paillier_modulus_bits: usize,

    /// Deadline for generating local pre-parameters (seconds)
    pub pre_params_timeout_secs: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            paillier_modulus_bits: 2048,
            pre_params_timeout_secs: 300,
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(TssError::Config("concurrency must not be zero".to_string()));
        }
        if self.paillier_modulus_bits < MIN_MODULUS_BITS || self.paillier_modulus_bits % 2 != 0 {
            return Err(TssError::Config(format!(
                "paillier modulus must be an even bit length of at least {}, got {}",
                MIN_MODULUS_BITS, self.paillier_modulus_bits
            )));
        }
        if self.pre_params_timeout_secs == 0 {
            return Err(TssError::Config("pre-params timeout must not be zero".to_string()));
        }
        Ok(())
    }

    pub fn pre_params_timeout(&self) -> Duration {
        Duration::from_secs(self.pre_params_timeout_secs)
    }
}

/// Parameters for one party's key generation
#[derive(Debug, Clone)]
pub struct Parameters {
    parties: SortedPartyIds,
    party_id: PartyId,
    threshold: usize,
    config: ProtocolConfig,
}

impl Parameters {
    /// `threshold + 1` parties are needed to use the key
    pub fn new(
        parties: SortedPartyIds,
        party_id: &PartyId,
        threshold: usize,
        config: ProtocolConfig,
    ) -> Result<Self> {
        config.validate()?;
        if threshold < 1 || threshold >= parties.len() {
            return Err(TssError::InvalidParameters(format!(
                "threshold {} is out of range for {} parties",
                threshold,
                parties.len()
            )));
        }
        let party_id = parties
            .find_by_key(&party_id.key)
            .cloned()
            .ok_or_else(|| {
                TssError::InvalidParameters(format!("{} is not one of the parties", party_id.moniker))
            })?;
        Ok(Self {
            parties,
            party_id,
            threshold,
            config,
        })
    }

    pub fn parties(&self) -> &SortedPartyIds {
        &self.parties
    }

    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}

/// Which committee a resharing party belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Committee {
    Old,
    New,
    /// Hands over its old share and receives a new one
    Both,
}

/// Parameters for one party's resharing.
///
/// A party in both committees is known by the same key in each but holds a
/// different position in each, so it has one [`PartyId`] per committee.
#[derive(Debug, Clone)]
pub struct ReSharingParameters {
    old_parties: SortedPartyIds,
    new_parties: SortedPartyIds,
    party_id: PartyId,
    old_id: Option<PartyId>,
    new_id: Option<PartyId>,
    old_threshold: usize,
    new_threshold: usize,
    committee: Committee,
    config: ProtocolConfig,
}

impl ReSharingParameters {
    pub fn new(
        old_parties: SortedPartyIds,
        new_parties: SortedPartyIds,
        party_id: &PartyId,
        old_threshold: usize,
        new_threshold: usize,
        config: ProtocolConfig,
    ) -> Result<Self> {
        config.validate()?;
        if old_threshold < 1 || old_threshold >= old_parties.len() {
            return Err(TssError::InvalidParameters(format!(
                "old threshold {} is out of range for {} parties",
                old_threshold,
                old_parties.len()
            )));
        }
        if new_threshold < 1 || new_threshold >= new_parties.len() {
            return Err(TssError::InvalidParameters(format!(
                "new threshold {} is out of range for {} parties",
                new_threshold,
                new_parties.len()
            )));
        }
        let old_id = old_parties.find_by_key(&party_id.key).cloned();
        let new_id = new_parties.find_by_key(&party_id.key).cloned();
        let Some(party_id) = new_id.clone().or_else(|| old_id.clone()) else {
            return Err(TssError::InvalidParameters(format!(
                "{} is not in the old or the new committee",
                party_id.moniker
            )));
        };
        let committee = match (&old_id, &new_id) {
            (Some(_), Some(_)) => Committee::Both,
            (Some(_), None) => Committee::Old,
            _ => Committee::New,
        };
        Ok(Self {
            old_parties,
            new_parties,
            party_id,
            old_id,
            new_id,
            old_threshold,
            new_threshold,
            committee,
            config,
        })
    }

    pub fn old_parties(&self) -> &SortedPartyIds {
        &self.old_parties
    }

    pub fn new_parties(&self) -> &SortedPartyIds {
        &self.new_parties
    }

    /// The new committee's copy of this party if it has one, else the old
    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    /// This party as a member of the old committee
    pub fn old_party_id(&self) -> Option<&PartyId> {
        self.old_id.as_ref()
    }

    /// This party as a member of the new committee
    pub fn new_party_id(&self) -> Option<&PartyId> {
        self.new_id.as_ref()
    }

    pub fn old_threshold(&self) -> usize {
        self.old_threshold
    }

    pub fn new_threshold(&self) -> usize {
        self.new_threshold
    }

    pub fn committee(&self) -> Committee {
        self.committee
    }

    pub fn is_old_committee(&self) -> bool {
        self.old_id.is_some()
    }

    pub fn is_new_committee(&self) -> bool {
        self.new_id.is_some()
    }

    pub fn old_and_new_parties(&self) -> Vec<PartyId> {
        let mut all = self.old_parties.ids().to_vec();
        all.extend_from_slice(self.new_parties.ids());
        all
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use tempfile::tempdir;

    fn committee(keys: &[u64]) -> SortedPartyIds {
        SortedPartyIds::new(
            keys.iter()
                .map(|k| PartyId::new(k.to_string(), format!("p{}", k), BigInt::from(*k)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concord.json");
        let config = ProtocolConfig {
            concurrency: 3,
            paillier_modulus_bits: 1024,
            pre_params_timeout_secs: 30,
        };
        config.save(&path).unwrap();
        let loaded = ProtocolConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "concurrency": 2 }"#).unwrap();
        let loaded = ProtocolConfig::load(&path).unwrap();
        assert_eq!(loaded.concurrency, 2);
        assert_eq!(loaded.paillier_modulus_bits, 2048);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ProtocolConfig {
            concurrency: 0,
            ..ProtocolConfig::default()
        };
        assert!(matches!(config.validate(), Err(TssError::Config(_))));
    }

    #[test]
    fn test_parameters_threshold_range() {
        let parties = committee(&[1, 2, 3]);
        let me = parties.ids()[1].clone();
        assert!(Parameters::new(parties.clone(), &me, 2, ProtocolConfig::default()).is_ok());
        assert!(Parameters::new(parties.clone(), &me, 3, ProtocolConfig::default()).is_err());
        assert!(Parameters::new(parties, &me, 0, ProtocolConfig::default()).is_err());
    }

    #[test]
    fn test_resharing_committee_membership() {
        let old = committee(&[1, 2]);
        let new = committee(&[3, 4, 5]);
        let old_member = old.ids()[0].clone();
        let params =
            ReSharingParameters::new(old.clone(), new.clone(), &old_member, 1, 1, ProtocolConfig::default())
                .unwrap();
        assert!(params.is_old_committee());
        assert_eq!(params.old_and_new_parties().len(), 5);

        let stranger = PartyId::new("x", "stranger", BigInt::from(99));
        assert!(ReSharingParameters::new(old.clone(), new, &stranger, 1, 1, ProtocolConfig::default())
            .is_err());

        let staying = old.ids()[1].clone();
        let overlapping = committee(&[2, 6]);
        let params =
            ReSharingParameters::new(old, overlapping, &staying, 1, 1, ProtocolConfig::default())
                .unwrap();
        assert_eq!(params.committee(), Committee::Both);
        assert!(params.is_old_committee() && params.is_new_committee());
        assert_eq!(params.old_party_id().map(PartyId::slot), Some(1));
        assert_eq!(params.new_party_id().map(PartyId::slot), Some(0));
        assert_eq!(params.party_id().slot(), 0);
    }
}
