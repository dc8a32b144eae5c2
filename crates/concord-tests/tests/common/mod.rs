//! Shared fixtures and an in-memory message router for the e2e tests

#![allow(dead_code)]

use concord_core::ec::scalar_from_bigint;
use concord_core::vss::{self, Share};
use concord_ecdsa::keygen::{self, KeygenContent};
use concord_ecdsa::resharing::{self, ResharingContent, ResharingInput};
use concord_ecdsa::{
    LocalPartySaveData, LocalPreParams, Message, MessageRouting, Parameters, PartyId, ProtocolConfig,
    ReSharingParameters, SortedPartyIds,
};
use k256::Scalar;
use num_bigint::BigInt;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Small moduli keep the tests fast
pub fn test_config() -> ProtocolConfig {
    ProtocolConfig {
        concurrency: 4,
        paillier_modulus_bits: 512,
        pre_params_timeout_secs: 600,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `count` parties with keys starting at `first_key`
pub fn party_ids(prefix: &str, first_key: u64, count: usize) -> SortedPartyIds {
    let ids = (0..count)
        .map(|i| {
            let key = first_key + i as u64;
            PartyId::new(format!("{}-{}", prefix, i), format!("{}{}", prefix, i), BigInt::from(key))
        })
        .collect();
    SortedPartyIds::new(ids).unwrap()
}

/// Pre-params for `count` parties, generated in parallel
pub async fn pre_params(count: usize, config: &ProtocolConfig) -> Vec<LocalPreParams> {
    let handles: Vec<_> = (0..count)
        .map(|_| {
            let config = config.clone();
            tokio::spawn(async move { keygen::generate_pre_params(&config).await })
        })
        .collect();
    let mut out = Vec::with_capacity(count);
    for handle in handles {
        out.push(handle.await.unwrap().unwrap());
    }
    out
}

/// Indexes of the parties a message is routed to
fn recipients<'a>(routing: &MessageRouting, ids: impl Iterator<Item = &'a PartyId>) -> Vec<usize> {
    ids.enumerate()
        .filter(|(_, id)| match &routing.to {
            None => id.key != routing.from.key,
            Some(to) => to.iter().any(|t| t.key == id.key),
        })
        .map(|(i, _)| i)
        .collect()
}

/// Start every party, then deliver messages over the wire encoding until none are left.
///
/// `tamper` sees every message before it is encoded.
pub async fn run_keygen(
    parties: &mut [keygen::LocalParty],
    out_rx: &mut UnboundedReceiver<Message<KeygenContent>>,
    mut tamper: impl FnMut(&mut Message<KeygenContent>),
) -> concord_ecdsa::Result<()> {
    for party in parties.iter_mut() {
        party.start().await?;
    }
    while let Ok(mut msg) = out_rx.try_recv() {
        tamper(&mut msg);
        let bytes = msg.to_bytes();
        for idx in recipients(&msg.routing, parties.iter().map(|p| p.party_id())) {
            parties[idx].update_from_bytes(&bytes).await?;
        }
    }
    Ok(())
}

pub async fn run_resharing(
    parties: &mut [resharing::LocalParty],
    out_rx: &mut UnboundedReceiver<Message<ResharingContent>>,
    mut tamper: impl FnMut(&mut Message<ResharingContent>),
) -> concord_ecdsa::Result<()> {
    for party in parties.iter_mut() {
        party.start().await?;
    }
    while let Ok(mut msg) = out_rx.try_recv() {
        tamper(&mut msg);
        let bytes = msg.to_bytes();
        for idx in recipients(&msg.routing, parties.iter().map(|p| p.party_id())) {
            parties[idx].update_from_bytes(&bytes).await?;
        }
    }
    Ok(())
}

/// A clean key generation over `ids`; saves come back in party order
pub async fn generate_key(ids: &SortedPartyIds, threshold: usize, config: &ProtocolConfig) -> Vec<LocalPartySaveData> {
    let pre = pre_params(ids.len(), config).await;
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel();
    let mut parties: Vec<keygen::LocalParty> = ids
        .ids()
        .iter()
        .zip(pre)
        .map(|(id, pre)| {
            let params = Parameters::new(ids.clone(), id, threshold, config.clone()).unwrap();
            keygen::LocalParty::new(params, pre, out_tx.clone(), end_tx.clone()).unwrap()
        })
        .collect();
    run_keygen(&mut parties, &mut out_rx, |_| {}).await.unwrap();
    let saves = collect_saves(&mut end_rx);
    assert_eq!(saves.len(), ids.len());
    saves
}

/// Resharing parties for the given members, sharing one outbound and one end channel
pub fn resharing_parties(
    old_ids: &SortedPartyIds,
    new_ids: &SortedPartyIds,
    thresholds: (usize, usize),
    config: &ProtocolConfig,
    members: Vec<(PartyId, ResharingInput)>,
) -> (
    Vec<resharing::LocalParty>,
    UnboundedReceiver<Message<ResharingContent>>,
    UnboundedReceiver<LocalPartySaveData>,
) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (end_tx, end_rx) = mpsc::unbounded_channel();
    let parties = members
        .into_iter()
        .map(|(id, input)| {
            let params = ReSharingParameters::new(
                old_ids.clone(),
                new_ids.clone(),
                &id,
                thresholds.0,
                thresholds.1,
                config.clone(),
            )
            .unwrap();
            resharing::LocalParty::new(params, input, out_tx.clone(), end_tx.clone()).unwrap()
        })
        .collect();
    (parties, out_rx, end_rx)
}

/// Everything sent on an end channel, ordered by share id
pub fn collect_saves(end_rx: &mut UnboundedReceiver<LocalPartySaveData>) -> Vec<LocalPartySaveData> {
    let mut saves = Vec::new();
    while let Ok(save) = end_rx.try_recv() {
        saves.push(save);
    }
    saves.sort_by(|a, b| a.share_id.cmp(&b.share_id));
    saves
}

/// Interpolate the group secret from the given saves
pub fn reconstruct_secret(saves: &[LocalPartySaveData], threshold: usize) -> Scalar {
    let shares: Vec<Share> = saves
        .iter()
        .map(|s| Share {
            threshold,
            id: scalar_from_bigint(&s.share_id).unwrap(),
            share: s.xi,
        })
        .collect();
    vss::reconstruct(&shares).unwrap()
}
