//! The round contract and the driver that advances a party through its rounds

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::{Result, TssError};
use crate::message::{Message, MessageContent};
use crate::party::PartyId;

/// One step of a protocol.
///
/// Rounds of the same protocol share one state value that is handed from a
/// round to its successor, so messages that arrive early are kept until the
/// round that needs them.
#[async_trait]
pub trait Round<C: MessageContent>: Send {
    fn round_number(&self) -> u32;

    /// Run this round's computation and send its messages. A second call fails.
    async fn start(&mut self) -> Result<()>;

    /// Whether `msg` belongs to this round
    fn can_accept(&self, msg: &Message<C>) -> bool;

    /// File `msg` into the shared state, for this or a later round
    fn store_message(&mut self, msg: Message<C>) -> Result<()>;

    /// `Ok(true)` once every required message has been received and accepted
    async fn update(&mut self) -> Result<bool>;

    /// Parties this round is still waiting on
    fn waiting_for(&self) -> Vec<PartyId>;

    /// The successor round, or `None` when the protocol is complete
    fn next_round(self: Box<Self>) -> Option<Box<dyn Round<C>>>;
}

/// Drives a sequence of rounds from the first `start` to completion
pub struct BaseParty<C: MessageContent> {
    task: &'static str,
    party_id: PartyId,
    first: Option<Box<dyn Round<C>>>,
    round: Option<Box<dyn Round<C>>>,
}

impl<C: MessageContent> BaseParty<C> {
    pub fn new(task: &'static str, party_id: PartyId, first: Box<dyn Round<C>>) -> Self {
        Self {
            task,
            party_id,
            first: Some(first),
            round: None,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        let mut round = self
            .first
            .take()
            .ok_or_else(|| TssError::InvalidState(format!("{} already started", self.task)))?;
        round
            .start()
            .await
            .inspect_err(|e| log_fatal(&self.party_id, self.task, e))?;
        info!(party = %self.party_id, task = self.task, round = round.round_number(), "round started");
        self.round = Some(round);
        self.advance().await?;
        Ok(())
    }

    /// Store a validated message and advance through every round that can proceed
    pub async fn update(&mut self, msg: Message<C>) -> Result<bool> {
        let Some(round) = self.round.as_mut() else {
            if self.first.is_some() {
                return Err(TssError::InvalidState(format!("{} has not started", self.task)));
            }
            debug!(party = %self.party_id, "message after completion ignored");
            return Ok(true);
        };
        if !round.can_accept(&msg) {
            debug!(
                party = %self.party_id,
                from = %msg.from(),
                kind = msg.type_name(),
                round = round.round_number(),
                "holding message for a later round"
            );
        }
        round.store_message(msg)?;
        self.advance().await
    }

    async fn advance(&mut self) -> Result<bool> {
        loop {
            let Some(round) = self.round.as_mut() else {
                return Ok(true);
            };
            if !round.update().await? {
                return Ok(true);
            }
            let Some(current) = self.round.take() else {
                return Ok(true);
            };
            match current.next_round() {
                Some(next) => {
                    let round = self.round.insert(next);
                    round
                        .start()
                        .await
                        .inspect_err(|e| log_fatal(&self.party_id, self.task, e))?;
                    info!(
                        party = %self.party_id,
                        task = self.task,
                        round = round.round_number(),
                        "round started"
                    );
                }
                None => {
                    info!(party = %self.party_id, task = self.task, "finished");
                    return Ok(true);
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.round.is_some()
    }

    /// Current round number, or `None` before start and after completion
    pub fn round_number(&self) -> Option<u32> {
        self.round.as_ref().map(|r| r.round_number())
    }

    pub fn waiting_for(&self) -> Vec<PartyId> {
        self.round.as_ref().map(|r| r.waiting_for()).unwrap_or_default()
    }
}

/// Run a proof computation on the blocking pool
pub(crate) async fn run_blocking<T, F>(task: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TssError::InvalidState(format!("{} task failed: {}", task, e)))?
}

fn log_fatal(party: &PartyId, task: &str, err: &TssError) {
    if err.is_fatal() {
        error!(party = %party, task, error = %err, "internal invariant violated");
    }
}

/// Keep the first message per slot
pub(crate) fn store_once<T>(slot: &mut Option<T>, msg: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(msg);
    true
}

/// A message the round has already checked to be present
pub(crate) fn received<T>(messages: &[Option<T>], j: usize, round: u32) -> Result<&T> {
    messages.get(j).and_then(Option::as_ref).ok_or_else(|| {
        TssError::InvalidState(format!("round {} started without the message from party {}", round, j))
    })
}
