//! End-to-end key generation tests
//!
//! Three parties run the full protocol over the wire encoding; the resulting
//! shares must agree on one group key that can actually sign.

mod common;

use concord_ecdsa::keygen::LocalParty;
use concord_ecdsa::Parameters;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::ProjectivePoint;
use tokio::sync::mpsc;

use common::{collect_saves, init_tracing, party_ids, pre_params, reconstruct_secret, run_keygen, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_party_keygen() {
    init_tracing();
    let config = test_config();
    let threshold = 2;

    // ==========================================
    // STEP 1: Generate pre-params and set up parties
    // ==========================================
    let ids = party_ids("kg", 1001, 3);
    let pre = pre_params(3, &config).await;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel();
    let mut parties: Vec<LocalParty> = ids
        .ids()
        .iter()
        .zip(pre)
        .map(|(id, pre)| {
            let params = Parameters::new(ids.clone(), id, threshold, config.clone()).unwrap();
            LocalParty::new(params, pre, out_tx.clone(), end_tx.clone()).unwrap()
        })
        .collect();

    // ==========================================
    // STEP 2: Run all three rounds
    // ==========================================
    run_keygen(&mut parties, &mut out_rx, |_| {}).await.unwrap();

    for party in &parties {
        assert!(!party.is_running(), "{} did not finish", party.party_id());
        assert!(party.waiting_for().is_empty());
    }
    let saves = collect_saves(&mut end_rx);
    assert_eq!(saves.len(), 3);

    // ==========================================
    // STEP 3: Every party agrees on the group key and public shares
    // ==========================================
    let ecdsa_pub = saves[0].ecdsa_pub;
    assert_ne!(ecdsa_pub, ProjectivePoint::IDENTITY);
    for (i, save) in saves.iter().enumerate() {
        assert_eq!(save.ecdsa_pub, ecdsa_pub);
        assert_eq!(save.big_xj, saves[0].big_xj);
        assert_eq!(save.ks, ids.keys());
        assert_eq!(ProjectivePoint::GENERATOR * save.xi, save.big_xj[i]);
        for j in 0..3 {
            assert_eq!(save.paillier_pks[j].n, saves[j].pre_params.paillier_sk.n().clone());
            assert_eq!(save.ntilde_j[j], saves[j].pre_params.ntilde);
        }
    }

    // ==========================================
    // STEP 4: The shares reconstruct the group secret
    // ==========================================
    let secret = reconstruct_secret(&saves, threshold);
    assert_eq!(ProjectivePoint::GENERATOR * secret, ecdsa_pub);

    // ==========================================
    // STEP 5: The group key signs
    // ==========================================
    let signing_key = SigningKey::from_bytes(&secret.to_bytes()).unwrap();
    let verifying_key = VerifyingKey::from_affine(ecdsa_pub.to_affine()).unwrap();
    assert_eq!(signing_key.verifying_key(), &verifying_key);

    let message = b"concord threshold key";
    let signature: Signature = signing_key.sign(message);
    assert!(verifying_key.verify(message, &signature).is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_party_rejects_second_start() {
    init_tracing();
    let config = test_config();
    let ids = party_ids("kg", 2001, 2);
    let pre = pre_params(1, &config).await.remove(0);

    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let (end_tx, _end_rx) = mpsc::unbounded_channel();
    let params = Parameters::new(ids.clone(), &ids.ids()[0], 1, config).unwrap();
    let mut party = LocalParty::new(params, pre, out_tx, end_tx).unwrap();

    party.start().await.unwrap();
    assert_eq!(party.round_number(), Some(1));
    assert_eq!(party.waiting_for(), vec![ids.ids()[1].clone()]);
    assert!(party.start().await.is_err());
}
