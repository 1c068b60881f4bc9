use sliced_common::Money;
use thiserror::Error;

use crate::{
    db_types::{AccountId, MatchState, NewMatch, PrivateRoom, QueueEntry},
    traits::{LedgerError, MatchError},
};

#[derive(Debug, Clone, Error)]
pub enum MatchmakingError {
    #[error("{0} is not an offered stake")]
    InvalidStake(Money),
    #[error("A queue entry vanished before the match could be created")]
    StaleQueue,
    #[error("Room {0} does not exist")]
    RoomNotFound(String),
    #[error("Room {0} is no longer open to join")]
    RoomUnavailable(String),
    #[error("Room code {0} is already in use")]
    RoomCodeTaken(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for MatchmakingError {
    fn from(e: sqlx::Error) -> Self {
        MatchmakingError::DatabaseError(e.to_string())
    }
}

/// The pre-match backend: the public per-stake queues and the code-addressed private rooms.
/// Entries in both are ephemeral and disappear the moment a match exists.
#[allow(async_fn_in_trait)]
pub trait MatchmakingManagement: Clone {
    /// Adds the player to the queue for `stake`. Re-joining refreshes the existing entry.
    async fn join_queue(&self, stake: Money, account: &AccountId, display_name: &str)
        -> Result<(), MatchmakingError>;

    async fn leave_queue(&self, stake: Money, account: &AccountId) -> Result<(), MatchmakingError>;

    /// Everyone currently searching at `stake`, oldest first.
    async fn queued_players(&self, stake: Money) -> Result<Vec<QueueEntry>, MatchmakingError>;

    /// Atomically converts two queue entries into a live match: verifies both entries still
    /// exist, charges each player's entry fee, deletes the entries and inserts the match. Any
    /// failure rolls the whole thing back. Returns the match and whether this call created it;
    /// if the match row already existed the queue work was done by the other creator and this
    /// call is a no-op.
    async fn create_match_from_queue(&self, new_match: NewMatch) -> Result<(MatchState, bool), MatchmakingError>;

    async fn create_room(
        &self,
        code: &str,
        creator: &AccountId,
        display_name: &str,
        stake: Money,
    ) -> Result<PrivateRoom, MatchmakingError>;

    async fn fetch_room(&self, code: &str) -> Result<Option<PrivateRoom>, MatchmakingError>;

    /// Claims the joiner slot of a waiting room. Fails with [`MatchmakingError::RoomUnavailable`]
    /// if the room is already full; two racing joiners cannot both claim it.
    async fn join_room(&self, code: &str, joiner: &AccountId, display_name: &str)
        -> Result<PrivateRoom, MatchmakingError>;

    /// Turns a full room into a live match (charging both entry fees) and deletes the room.
    async fn convert_room_to_match(&self, code: &str) -> Result<(MatchState, bool), MatchmakingError>;

    async fn delete_room(&self, code: &str) -> Result<(), MatchmakingError>;
}
