//! Bounded concurrent proof verification.
//!
//! Every verification passes a shared admission gate before it is handed to
//! the blocking pool, so at most `concurrency` proofs are checked at once.
//! Callers that need all results wait on a [`JoinBarrier`].

use std::sync::Arc;

use concord_core::paillier::wire::{FactorProofBytes, KeyProofBytes, ModProofBytes, ParamProofBytes};
use concord_core::DlnProofBytes;
use k256::ProjectivePoint;
use num_bigint::BigInt;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::error::{Result, TssError};

/// Messages carrying the two discrete-log proofs
pub trait DlnMessage {
    fn dln_proof_1(&self) -> &DlnProofBytes;
    fn dln_proof_2(&self) -> &DlnProofBytes;
}

pub trait ParamMessage {
    fn param_proof(&self) -> &ParamProofBytes;
}

pub trait ModMessage {
    fn mod_proof(&self) -> &ModProofBytes;
}

/// Messages carrying a modulus proof for the auxiliary modulus
pub trait ModTildeMessage {
    fn mod_proof_tilde(&self) -> &ModProofBytes;
}

pub trait FactorMessage {
    fn factor_proof(&self) -> &FactorProofBytes;
}

/// Messages carrying a no-small-factor proof for the auxiliary modulus
pub trait FactorTildeMessage {
    fn factor_proof_tilde(&self) -> &FactorProofBytes;
}

pub trait KeyProofMessage {
    fn key_proof(&self) -> &KeyProofBytes;
}

fn outcome(kind: &'static str, result: concord_core::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(proof = kind, error = %e, "proof rejected");
            false
        }
    }
}

/// Runs proof verifications on the blocking pool behind a fixed-width gate
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    semaphore: Arc<Semaphore>,
}

impl ProofVerifier {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(TssError::Config(
                "verifier concurrency must not be zero".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
        })
    }

    /// Run `verify` once a slot is free and pass its result to `on_done`.
    ///
    /// Returns as soon as the task is spawned; waits only while the gate is full.
    pub async fn dispatch<F, D>(&self, verify: F, on_done: D)
    where
        F: FnOnce() -> bool + Send + 'static,
        D: FnOnce(bool) + Send + 'static,
    {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                on_done(false);
                return;
            }
        };
        tokio::task::spawn_blocking(move || {
            let ok = verify();
            on_done(ok);
            drop(permit);
        });
    }

    pub async fn verify_param_proof<M, D>(&self, msg: &M, n: &BigInt, s: &BigInt, t: &BigInt, on_done: D)
    where
        M: ParamMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.param_proof().clone();
        let (n, s, t) = (n.clone(), s.clone(), t.clone());
        self.dispatch(
            move || outcome("param", bytes.to_proof().and_then(|p| p.verify(&n, &s, &t))),
            on_done,
        )
        .await
    }

    pub async fn verify_mod_proof<M, D>(&self, msg: &M, n: &BigInt, on_done: D)
    where
        M: ModMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.mod_proof().clone();
        let n = n.clone();
        self.dispatch(
            move || outcome("mod", bytes.to_proof().and_then(|p| p.verify(&n))),
            on_done,
        )
        .await
    }

    pub async fn verify_mod_proof_tilde<M, D>(&self, msg: &M, n_tilde: &BigInt, on_done: D)
    where
        M: ModTildeMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.mod_proof_tilde().clone();
        let n = n_tilde.clone();
        self.dispatch(
            move || outcome("mod tilde", bytes.to_proof().and_then(|p| p.verify(&n))),
            on_done,
        )
        .await
    }

    /// Check the sender's no-small-factor proof for `pk_n` under our `(n, s, t)`
    pub async fn verify_factor_proof<M, D>(
        &self,
        msg: &M,
        pk_n: &BigInt,
        n: &BigInt,
        s: &BigInt,
        t: &BigInt,
        on_done: D,
    ) where
        M: FactorMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.factor_proof().clone();
        let (pk_n, n, s, t) = (pk_n.clone(), n.clone(), s.clone(), t.clone());
        self.dispatch(
            move || {
                outcome(
                    "factor",
                    bytes.to_proof().and_then(|p| p.verify(&pk_n, &n, &s, &t)),
                )
            },
            on_done,
        )
        .await
    }

    pub async fn verify_factor_proof_tilde<M, D>(
        &self,
        msg: &M,
        n_tilde_j: &BigInt,
        n: &BigInt,
        s: &BigInt,
        t: &BigInt,
        on_done: D,
    ) where
        M: FactorTildeMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.factor_proof_tilde().clone();
        let (pk_n, n, s, t) = (n_tilde_j.clone(), n.clone(), s.clone(), t.clone());
        self.dispatch(
            move || {
                outcome(
                    "factor tilde",
                    bytes.to_proof().and_then(|p| p.verify(&pk_n, &n, &s, &t)),
                )
            },
            on_done,
        )
        .await
    }

    /// Proof that `h2 = h1^alpha`
    pub async fn verify_dln_proof_1<M, D>(&self, msg: &M, h1: &BigInt, h2: &BigInt, n: &BigInt, on_done: D)
    where
        M: DlnMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.dln_proof_1().clone();
        let (h1, h2, n) = (h1.clone(), h2.clone(), n.clone());
        self.dispatch(
            move || outcome("dln 1", bytes.to_proof().and_then(|p| p.verify(&h1, &h2, &n))),
            on_done,
        )
        .await
    }

    /// Proof that `h1 = h2^beta`; pass the bases in that order
    pub async fn verify_dln_proof_2<M, D>(&self, msg: &M, h2: &BigInt, h1: &BigInt, n: &BigInt, on_done: D)
    where
        M: DlnMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.dln_proof_2().clone();
        let (h2, h1, n) = (h2.clone(), h1.clone(), n.clone());
        self.dispatch(
            move || outcome("dln 2", bytes.to_proof().and_then(|p| p.verify(&h2, &h1, &n))),
            on_done,
        )
        .await
    }

    pub async fn verify_key_proof<M, D>(
        &self,
        msg: &M,
        pk_n: &BigInt,
        k: &BigInt,
        ecdsa_pub: &ProjectivePoint,
        on_done: D,
    ) where
        M: KeyProofMessage,
        D: FnOnce(bool) + Send + 'static,
    {
        let bytes = msg.key_proof().clone();
        let (pk_n, k, ecdsa_pub) = (pk_n.clone(), k.clone(), *ecdsa_pub);
        self.dispatch(
            move || {
                outcome(
                    "paillier key",
                    bytes.to_proof().and_then(|p| p.verify(&pk_n, &k, &ecdsa_pub)),
                )
            },
            on_done,
        )
        .await
    }
}

/// Waits for a fixed set of verification callbacks.
///
/// Each [`slot`](JoinBarrier::slot) carries a tag; [`wait`](JoinBarrier::wait)
/// returns the tags whose callback reported failure or was dropped uncalled.
pub struct JoinBarrier<T> {
    tags: Vec<T>,
    tx: mpsc::UnboundedSender<(usize, bool)>,
    rx: mpsc::UnboundedReceiver<(usize, bool)>,
}

impl<T> JoinBarrier<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tags: Vec::new(),
            tx,
            rx,
        }
    }

    /// A completion callback for one more verification
    pub fn slot(&mut self, tag: T) -> impl FnOnce(bool) + Send + 'static {
        let index = self.tags.len();
        self.tags.push(tag);
        let tx = self.tx.clone();
        move |ok| {
            let _ = tx.send((index, ok));
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Wait for every slot, returning the tags that did not pass
    pub async fn wait(self) -> Vec<T> {
        let Self { tags, tx, mut rx } = self;
        drop(tx);
        let mut results: Vec<Option<bool>> = vec![None; tags.len()];
        while let Some((index, ok)) = rx.recv().await {
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(ok);
            }
        }
        tags.into_iter()
            .zip(results)
            .filter_map(|(tag, ok)| (ok != Some(true)).then_some(tag))
            .collect()
    }
}

impl<T> Default for JoinBarrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(ProofVerifier::new(0), Err(TssError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_barrier_sees_every_callback() {
        const K: usize = 6;
        for width in 1..=K {
            let verifier = ProofVerifier::new(width).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));
            let mut barrier = JoinBarrier::new();
            for i in 0..K {
                let done = barrier.slot(i);
                let calls = calls.clone();
                verifier
                    .dispatch(
                        move || i % 3 != 0,
                        move |ok| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            done(ok)
                        },
                    )
                    .await;
            }
            let failed = barrier.wait().await;
            assert_eq!(calls.load(Ordering::SeqCst), K);
            assert_eq!(failed, vec![0, 3]);
        }
    }

    #[tokio::test]
    async fn test_dropped_callback_counts_as_failure() {
        let mut barrier = JoinBarrier::new();
        let pass = barrier.slot("pass");
        let lost = barrier.slot("lost");
        pass(true);
        drop(lost);
        assert_eq!(barrier.wait().await, vec!["lost"]);
    }

    #[tokio::test]
    async fn test_undecodable_proof_reports_false() {
        struct Empty(ModProofBytes);
        impl ModMessage for Empty {
            fn mod_proof(&self) -> &ModProofBytes {
                &self.0
            }
        }
        let msg = Empty(ModProofBytes {
            w: Vec::new(),
            x: Vec::new(),
            a: Vec::new(),
            b: Vec::new(),
            z: Vec::new(),
        });
        let verifier = ProofVerifier::new(1).unwrap();
        let mut barrier = JoinBarrier::new();
        verifier
            .verify_mod_proof(&msg, &BigInt::from(77), barrier.slot(()))
            .await;
        assert_eq!(barrier.wait().await.len(), 1);
    }
}
