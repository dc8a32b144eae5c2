//! Per-round blame collection.
//!
//! Every peer's checks run to completion; failures are gathered here and
//! turned into a single [`RoundError`] naming all of them.

use std::collections::{BTreeMap, HashSet};

use num_bigint::BigInt;
use tracing::warn;

use crate::error::{RoundError, TssError};
use crate::party::PartyId;

#[derive(Debug, Default)]
pub(crate) struct Culprits {
    blamed: BTreeMap<usize, Vec<String>>,
}

impl Culprits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blame(&mut self, slot: usize, cause: impl Into<String>) {
        self.blamed.entry(slot).or_default().push(cause.into());
    }

    /// `Ok(())` when nobody was blamed, otherwise one error naming every culprit
    pub fn into_result(
        self,
        task: &'static str,
        round: u32,
        victim: &PartyId,
        committee: &[PartyId],
    ) -> Result<(), TssError> {
        if self.blamed.is_empty() {
            return Ok(());
        }
        let mut causes = Vec::new();
        let mut culprits = Vec::new();
        for (slot, reasons) in self.blamed {
            let Some(party) = committee.get(slot) else {
                continue;
            };
            for reason in &reasons {
                warn!(party = %victim, culprit = %party, round, "{}", reason);
            }
            causes.push(format!("{}: {}", party, reasons.join(", ")));
            culprits.push(party.clone());
        }
        Err(RoundError::new(causes.join("; "), task, round, Some(victim.clone()), culprits).into())
    }
}

/// Public auxiliary parameters announced by one party
pub(crate) struct PeerAuxParams {
    pub slot: usize,
    pub paillier_n: BigInt,
    pub ntilde: BigInt,
    pub h1: BigInt,
    pub h2: BigInt,
}

/// Modulus sizes, `h1 != h2`, and no `h1`/`h2` reused by another party
pub(crate) fn check_aux_params(peers: &[PeerAuxParams], modulus_bits: usize, culprits: &mut Culprits) {
    let mut seen: HashSet<Vec<u8>> = HashSet::with_capacity(peers.len() * 2);
    for peer in peers {
        if peer.paillier_n.bits() as usize != modulus_bits {
            culprits.blame(
                peer.slot,
                format!("paillier modulus has {} bits", peer.paillier_n.bits()),
            );
        }
        if peer.ntilde.bits() as usize != modulus_bits {
            culprits.blame(peer.slot, format!("ntilde has {} bits", peer.ntilde.bits()));
        }
        if peer.h1 == peer.h2 {
            culprits.blame(peer.slot, "h1 and h2 are equal");
        }
        for (name, h) in [("h1", &peer.h1), ("h2", &peer.h2)] {
            if !seen.insert(h.to_bytes_be().1) {
                culprits.blame(peer.slot, format!("{} was already used by another party", name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committee() -> Vec<PartyId> {
        (1..=3)
            .map(|k| {
                let mut p = PartyId::new(k.to_string(), format!("p{}", k), BigInt::from(k));
                p.index = (k - 1) as u32;
                p
            })
            .collect()
    }

    fn peer(slot: usize, h1: u64, h2: u64) -> PeerAuxParams {
        let n: BigInt = BigInt::from(1u32) << 63;
        PeerAuxParams {
            slot,
            paillier_n: n.clone(),
            ntilde: n,
            h1: BigInt::from(h1),
            h2: BigInt::from(h2),
        }
    }

    #[test]
    fn test_every_culprit_reported() {
        let ids = committee();
        let mut culprits = Culprits::new();
        culprits.blame(2, "mod proof failed");
        culprits.blame(0, "dln proof 1 failed");
        culprits.blame(2, "dln proof 2 failed");
        let err = culprits.into_result("test", 2, &ids[1], &ids).unwrap_err();
        let names: Vec<&str> = err.culprits().iter().map(|p| p.moniker.as_str()).collect();
        assert_eq!(names, vec!["p1", "p3"]);
        assert!(err.to_string().contains("dln proof 2 failed"));
    }

    #[test]
    fn test_no_culprits_is_ok() {
        let ids = committee();
        assert!(Culprits::new().into_result("test", 1, &ids[0], &ids).is_ok());
    }

    #[test]
    fn test_aux_param_checks() {
        let mut culprits = Culprits::new();
        let peers = vec![peer(0, 5, 6), peer(1, 7, 7), peer(2, 6, 9)];
        check_aux_params(&peers, 64, &mut culprits);
        let blamed: Vec<usize> = culprits.blamed.keys().copied().collect();
        assert_eq!(blamed, vec![1, 2]);

        let mut culprits = Culprits::new();
        check_aux_params(&[peer(0, 5, 6)], 2048, &mut culprits);
        assert_eq!(culprits.blamed[&0].len(), 2);
    }
}
