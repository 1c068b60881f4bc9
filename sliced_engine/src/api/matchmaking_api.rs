//! Public queue and private room flows.
//!
//! Matchmaking is symmetric: both queued players poll, and the one with the smaller account id
//! creates the match. The loser of that coin toss keeps polling and discovers the match through
//! [`MatchManagement::find_match_for`](crate::traits::MatchManagement::find_match_for).
use std::fmt::Debug;

use log::*;
use rand::Rng;
use sliced_common::Money;

use crate::{
    db_types::{AccountId, MatchState, NewMatch, PrivateRoom, QueueEntry},
    traits::{MatchmakingError, MatchmakingManagement},
};

const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_CODE_ATTEMPTS: usize = 5;

pub struct MatchmakingApi<B> {
    db: B,
}

impl<B> Debug for MatchmakingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchmakingApi")
    }
}

impl<B> MatchmakingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN).map(|_| ROOM_CODE_CHARSET[rng.gen_range(0..ROOM_CODE_CHARSET.len())] as char).collect()
}

impl<B> MatchmakingApi<B>
where B: MatchmakingManagement
{
    pub async fn join_queue(
        &self,
        stake: Money,
        account: &AccountId,
        display_name: &str,
    ) -> Result<(), MatchmakingError> {
        self.db.join_queue(stake, account, display_name).await?;
        debug!("🎯️ {account} joined the queue at stake {stake}");
        Ok(())
    }

    pub async fn leave_queue(&self, stake: Money, account: &AccountId) -> Result<(), MatchmakingError> {
        self.db.leave_queue(stake, account).await
    }

    pub async fn queued_players(&self, stake: Money) -> Result<Vec<QueueEntry>, MatchmakingError> {
        self.db.queued_players(stake).await
    }

    /// One matchmaking poll. Scans the queue for an opponent and, if this player holds the
    /// smaller account id, creates the match (charging both entry fees atomically). Returns
    /// `None` when there is nobody to pair with yet, or when match creation is the opponent's
    /// job. The returned flag says whether this call created the match.
    pub async fn try_create_public_match(
        &self,
        stake: Money,
        account: &AccountId,
        display_name: &str,
    ) -> Result<Option<(MatchState, bool)>, MatchmakingError> {
        let queue = self.db.queued_players(stake).await?;
        let Some(opponent) = queue.iter().find(|entry| &entry.account_id != account) else {
            return Ok(None);
        };
        if account > &opponent.account_id {
            // The opponent creates; we'll find the match on a later poll.
            return Ok(None);
        }
        let new_match = NewMatch::new(
            stake,
            (account.clone(), display_name.to_string()),
            (opponent.account_id.clone(), opponent.display_name.clone()),
            false,
        );
        let (state, created) = self.db.create_match_from_queue(new_match).await?;
        if created {
            debug!("🎯️ {account} created match {} against {}", state.id, opponent.account_id);
        }
        Ok(Some((state, created)))
    }

    /// Opens a private room and returns it, with a freshly generated share code. Code collisions
    /// are retried a few times before giving up.
    pub async fn create_private_room(
        &self,
        stake: Money,
        creator: &AccountId,
        display_name: &str,
    ) -> Result<PrivateRoom, MatchmakingError> {
        let mut last_err = MatchmakingError::RoomCodeTaken(String::new());
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let code = generate_room_code();
            match self.db.create_room(&code, creator, display_name, stake).await {
                Ok(room) => {
                    debug!("🎯️ {creator} opened private room {}", room.code);
                    return Ok(room);
                },
                Err(MatchmakingError::RoomCodeTaken(code)) => {
                    last_err = MatchmakingError::RoomCodeTaken(code);
                },
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    pub async fn room_status(&self, code: &str) -> Result<Option<PrivateRoom>, MatchmakingError> {
        self.db.fetch_room(code).await
    }

    pub async fn join_private_room(
        &self,
        code: &str,
        joiner: &AccountId,
        display_name: &str,
    ) -> Result<PrivateRoom, MatchmakingError> {
        let room = self.db.join_room(code, joiner, display_name).await?;
        debug!("🎯️ {joiner} joined private room {code}");
        Ok(room)
    }

    /// Converts a full room into a live match. Only the room's creator may start it; the joiner
    /// discovers the match by polling.
    pub async fn start_private_match(
        &self,
        code: &str,
        account: &AccountId,
    ) -> Result<(MatchState, bool), MatchmakingError> {
        let room =
            self.db.fetch_room(code).await?.ok_or_else(|| MatchmakingError::RoomNotFound(code.to_string()))?;
        if &room.creator_id != account {
            return Err(MatchmakingError::RoomUnavailable(code.to_string()));
        }
        self.db.convert_room_to_match(code).await
    }

    /// Tears down a room that never became a match. Only the creator may cancel.
    pub async fn cancel_room(&self, code: &str, account: &AccountId) -> Result<(), MatchmakingError> {
        let room =
            self.db.fetch_room(code).await?.ok_or_else(|| MatchmakingError::RoomNotFound(code.to_string()))?;
        if &room.creator_id != account {
            return Err(MatchmakingError::RoomUnavailable(code.to_string()));
        }
        self.db.delete_room(code).await
    }
}
