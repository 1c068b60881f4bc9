use thiserror::Error;
use tokio::sync::broadcast;

use crate::{
    db_types::{AccountId, MatchId, MatchState, NewMatch},
    game::GameError,
    traits::{LedgerError, PrizeSplit},
};

#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("Match not found: {0}")]
    NotFound(MatchId),
    #[error(transparent)]
    Rules(#[from] GameError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for MatchError {
    fn from(e: sqlx::Error) -> Self {
        MatchError::DatabaseError(e.to_string())
    }
}

/// Storage for live match documents.
///
/// All rule transitions run through [`transactional_update`], which loads the row, applies the
/// closure and writes it back under one transaction. Two clients racing the same transition (both
/// passing an expired turn, both clicking the sudden-death target) therefore serialise, and the
/// loser of the race observes the winner's state instead of clobbering it.
///
/// [`transactional_update`]: MatchManagement::transactional_update
#[allow(async_fn_in_trait)]
pub trait MatchManagement: Clone {
    /// Inserts the match if its id is new. Returns the stored state and whether this call created
    /// it; with deterministic ids, racing creators converge on a single row.
    async fn insert_match(&self, new_match: NewMatch) -> Result<(MatchState, bool), MatchError>;

    async fn fetch_match(&self, id: &MatchId) -> Result<Option<MatchState>, MatchError>;

    /// The unfinished match the account is playing in, if any.
    async fn find_match_for(&self, account: &AccountId) -> Result<Option<MatchState>, MatchError>;

    /// Runs `update` against the current state inside a transaction and persists the result.
    /// An `Err` from the closure rolls everything back and is returned as
    /// [`MatchError::Rules`]. When a concurrent writer wins the row, the closure is re-run
    /// against their committed state, so it must be safe to call more than once. Subscribers
    /// are notified of the committed state.
    async fn transactional_update<F, T>(&self, id: &MatchId, update: F) -> Result<(MatchState, T), MatchError>
    where
        F: FnMut(&mut MatchState) -> Result<T, GameError> + Send,
        T: Send;

    /// A live feed of every state committed for the match.
    fn subscribe(&self, id: &MatchId) -> broadcast::Receiver<MatchState>;

    /// Pays out a finished match exactly once. The winner's credit and any referral commission
    /// land in the same transaction that flips the match's settled flag; a second call (or a
    /// concurrent racer) returns `Ok(false)` without moving money.
    async fn settle_match(&self, id: &MatchId, split: &PrizeSplit) -> Result<bool, MatchError>;

    /// Removes the match row. Settled matches are deleted rather than archived; the ledger keeps
    /// the financial trail.
    async fn delete_match(&self, id: &MatchId) -> Result<(), MatchError>;
}
