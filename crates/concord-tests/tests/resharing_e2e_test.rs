//! End-to-end resharing tests
//!
//! A key generated by three parties is handed by two of them to a fresh
//! three-party committee. The new shares must open to the same secret and the
//! old committee must be left with nothing. A party sitting in both
//! committees leaves with a fresh share in place of its old one.

mod common;

use concord_ecdsa::keygen;
use concord_ecdsa::resharing::{self, ResharingInput};
use concord_ecdsa::{Committee, Parameters, PartyId, ReSharingParameters, SortedPartyIds};
use num_bigint::BigInt;
use k256::{ProjectivePoint, Scalar};
use tokio::sync::mpsc;

use common::{
    collect_saves, generate_key, init_tracing, party_ids, pre_params, reconstruct_secret, resharing_parties,
    run_keygen, run_resharing, test_config,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reshare_to_new_committee() {
    init_tracing();
    let config = test_config();

    // ==========================================
    // STEP 1: Generate a 2-of-3 key
    // ==========================================
    let kg_ids = party_ids("old", 3001, 3);
    let kg_pre = pre_params(3, &config).await;
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel();
    let mut kg_parties: Vec<keygen::LocalParty> = kg_ids
        .ids()
        .iter()
        .zip(kg_pre)
        .map(|(id, pre)| {
            let params = Parameters::new(kg_ids.clone(), id, 1, config.clone()).unwrap();
            keygen::LocalParty::new(params, pre, out_tx.clone(), end_tx.clone()).unwrap()
        })
        .collect();
    run_keygen(&mut kg_parties, &mut out_rx, |_| {}).await.unwrap();
    let kg_saves = collect_saves(&mut end_rx);
    assert_eq!(kg_saves.len(), 3);
    let ecdsa_pub = kg_saves[0].ecdsa_pub;
    let secret = reconstruct_secret(&kg_saves[..2], 1);

    // ==========================================
    // STEP 2: Two old parties reshare to three new ones
    // ==========================================
    let old_ids = SortedPartyIds::new(kg_ids.ids()[1..].to_vec()).unwrap();
    let new_ids = party_ids("new", 4001, 3);
    let new_pre = pre_params(3, &config).await;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel();
    let mut parties = Vec::new();
    for (id, save) in kg_ids.ids()[1..].iter().zip(&kg_saves[1..]) {
        let params =
            ReSharingParameters::new(old_ids.clone(), new_ids.clone(), id, 1, 1, config.clone()).unwrap();
        assert!(params.is_old_committee());
        parties.push(
            resharing::LocalParty::new(params, ResharingInput::Old(save.clone()), out_tx.clone(), end_tx.clone())
                .unwrap(),
        );
    }
    for (id, pre) in new_ids.ids().iter().zip(new_pre) {
        let params =
            ReSharingParameters::new(old_ids.clone(), new_ids.clone(), id, 1, 1, config.clone()).unwrap();
        assert!(params.is_new_committee());
        parties.push(
            resharing::LocalParty::new(params, ResharingInput::New(pre), out_tx.clone(), end_tx.clone()).unwrap(),
        );
    }

    run_resharing(&mut parties, &mut out_rx, |_| {}).await.unwrap();
    for party in &parties {
        assert!(!party.is_running(), "{} did not finish", party.party_id());
    }

    // ==========================================
    // STEP 3: Old shares are zeroed
    // ==========================================
    let saves = collect_saves(&mut end_rx);
    assert_eq!(saves.len(), 5);
    let (old_saves, new_saves): (Vec<_>, Vec<_>) =
        saves.into_iter().partition(|s| old_ids.keys().contains(&s.share_id));
    assert_eq!(old_saves.len(), 2);
    for save in &old_saves {
        assert_eq!(save.xi, Scalar::ZERO);
    }

    // ==========================================
    // STEP 4: New shares open to the same key
    // ==========================================
    assert_eq!(new_saves.len(), 3);
    for (i, save) in new_saves.iter().enumerate() {
        assert_eq!(save.ecdsa_pub, ecdsa_pub);
        assert_eq!(save.ks, new_ids.keys());
        assert_eq!(save.big_xj, new_saves[0].big_xj);
        assert_eq!(ProjectivePoint::GENERATOR * save.xi, save.big_xj[i]);
    }
    assert_eq!(reconstruct_secret(&new_saves[..2], 1), secret);
    assert_eq!(reconstruct_secret(&new_saves[1..], 1), secret);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reshare_to_overlapping_committee() {
    init_tracing();
    let config = test_config();

    // ==========================================
    // STEP 1: A, B and C hold a 2-of-3 key
    // ==========================================
    let old_ids = party_ids("m", 11001, 3);
    let kg_saves = generate_key(&old_ids, 1, &config).await;
    let ecdsa_pub = kg_saves[0].ecdsa_pub;
    let secret = reconstruct_secret(&kg_saves[..2], 1);

    // ==========================================
    // STEP 2: Hand it to B, C and a newcomer D
    // ==========================================
    let (a, b, c) = (old_ids.ids()[0].clone(), old_ids.ids()[1].clone(), old_ids.ids()[2].clone());
    let d = PartyId::new("m-3", "m3", BigInt::from(11004u64));
    let new_ids = SortedPartyIds::new(vec![b.clone(), c.clone(), d.clone()]).unwrap();
    let params = ReSharingParameters::new(old_ids.clone(), new_ids.clone(), &b, 1, 1, config.clone()).unwrap();
    assert_eq!(params.committee(), Committee::Both);

    let mut new_pre = pre_params(3, &config).await.into_iter();
    let mut next_pre = || new_pre.next().unwrap();
    let members = vec![
        (a, ResharingInput::Old(kg_saves[0].clone())),
        (b, ResharingInput::Both(kg_saves[1].clone(), next_pre())),
        (c, ResharingInput::Both(kg_saves[2].clone(), next_pre())),
        (d, ResharingInput::New(next_pre())),
    ];
    let (mut parties, mut out_rx, mut end_rx) = resharing_parties(&old_ids, &new_ids, (1, 1), &config, members);
    run_resharing(&mut parties, &mut out_rx, |_| {}).await.unwrap();
    for party in &parties {
        assert!(!party.is_running(), "{} did not finish", party.party_id());
    }

    // ==========================================
    // STEP 3: Only A is left without a share
    // ==========================================
    let saves = collect_saves(&mut end_rx);
    assert_eq!(saves.len(), 4);
    let (new_saves, old_saves): (Vec<_>, Vec<_>) =
        saves.into_iter().partition(|s| new_ids.keys().contains(&s.share_id));
    assert_eq!(old_saves.len(), 1);
    assert_eq!(old_saves[0].xi, Scalar::ZERO);

    // ==========================================
    // STEP 4: B, C and D open to the same key
    // ==========================================
    assert_eq!(new_saves.len(), 3);
    for (i, save) in new_saves.iter().enumerate() {
        assert_eq!(save.ecdsa_pub, ecdsa_pub);
        assert_eq!(save.ks, new_ids.keys());
        assert_eq!(ProjectivePoint::GENERATOR * save.xi, save.big_xj[i]);
    }
    assert_ne!(new_saves[0].xi, kg_saves[1].xi);
    assert_eq!(reconstruct_secret(&new_saves[..2], 1), secret);
    assert_eq!(reconstruct_secret(&new_saves[1..], 1), secret);
}

#[test]
fn test_party_in_neither_committee_rejected() {
    let config = test_config();
    let old_ids = party_ids("old", 5001, 2);
    let new_ids = party_ids("new", 6001, 2);
    let outsider = party_ids("x", 7001, 1).ids()[0].clone();
    assert!(ReSharingParameters::new(old_ids, new_ids, &outsider, 1, 1, config).is_err());
}
