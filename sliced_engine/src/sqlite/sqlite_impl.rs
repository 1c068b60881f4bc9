//! `SqliteDatabase` is the concrete SQLite backend. It implements every trait in the [`traits`]
//! module and owns the in-process watch registry that push sockets subscribe to.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sliced_common::Money;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use super::db::{create_schema, db_url, ledger, matches, new_pool, queue, rooms};
use crate::{
    db_types::{
        is_valid_stake,
        Account,
        AccountId,
        LedgerEntry,
        LedgerOutcome,
        MatchId,
        MatchState,
        NewAccount,
        NewMatch,
        PrivateRoom,
        QueueEntry,
    },
    game::GameError,
    traits::{
        LedgerError,
        LedgerManagement,
        LedgerOperation,
        MatchError,
        MatchManagement,
        MatchmakingError,
        MatchmakingManagement,
        PrizeSplit,
    },
    watch::MatchWatch,
};

/// Upper bound on re-reads when a match update loses a write race.
const WRITE_CONFLICT_RETRIES: usize = 3;

// With WAL and a multi-connection pool, the loser of a write race gets SQLITE_BUSY or
// SQLITE_BUSY_SNAPSHOT; both surface through sqlx as "database is locked".
fn is_write_conflict(e: &MatchError) -> bool {
    matches!(e, MatchError::DatabaseError(msg) if msg.contains("database is locked"))
}

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    watch: MatchWatch,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `SLICED_DATABASE_URL` and creates any missing tables.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        create_schema(&pool).await?;
        debug!("🗃️ Database connection established to {url}");
        Ok(Self { url: url.to_string(), pool, watch: MatchWatch::new() })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Charges both players' entry fees and stamps the charge flags, all in the transaction that
    /// creates the match. Any [`LedgerError`] aborts the caller's transaction.
    async fn charge_entry_fees(
        &self,
        state: &mut MatchState,
        tx: &mut sqlx::SqliteConnection,
    ) -> Result<(), LedgerError> {
        let fee = state.entry_fee();
        for i in 0..2 {
            let account = state.players[i].account_id.clone();
            let outcome = ledger::apply_operation(&LedgerOperation::game_charge(account, &state.id, fee), tx).await?;
            if !outcome.applied {
                debug!("🗃️ Entry fee for {} on {} was already charged", state.players[i].account_id, state.id);
            }
            state.entry_charged[i] = true;
        }
        Ok(())
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn upsert_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::upsert_account(&account, &mut conn).await
    }

    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_account(id, &mut conn).await
    }

    async fn apply_operation(&self, op: LedgerOperation) -> Result<LedgerOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let outcome = ledger::apply_operation(&op, &mut tx).await?;
        if outcome.applied {
            tx.commit().await?;
            debug!("🗃️ Applied {} {} for {}: balance is now {}", op.kind, op.delta, op.account_id, outcome.new_balance);
        } else {
            // A replay must not keep any writes, including the balance update it raced on.
            tx.rollback().await?;
            debug!("🗃️ {} {} for {} was already applied", op.kind, op.external_ref, op.account_id);
        }
        Ok(outcome)
    }

    async fn balance(&self, id: &AccountId) -> Result<Money, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_balance(id, &mut conn).await
    }

    async fn history_for_account(&self, id: &AccountId, limit: i64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::history(id, limit, &mut conn).await
    }
}

impl MatchManagement for SqliteDatabase {
    async fn insert_match(&self, new_match: NewMatch) -> Result<(MatchState, bool), MatchError> {
        let mut conn = self.pool.acquire().await?;
        let state = new_match.into_state(Utc::now());
        if matches::insert_match(&state, &mut conn).await? {
            return Ok((state, true));
        }
        let existing =
            matches::fetch_match(&state.id, &mut conn).await?.ok_or_else(|| MatchError::NotFound(state.id.clone()))?;
        Ok((existing, false))
    }

    async fn fetch_match(&self, id: &MatchId) -> Result<Option<MatchState>, MatchError> {
        let mut conn = self.pool.acquire().await?;
        matches::fetch_match(id, &mut conn).await
    }

    async fn find_match_for(&self, account: &AccountId) -> Result<Option<MatchState>, MatchError> {
        let mut conn = self.pool.acquire().await?;
        matches::find_match_for(account, &mut conn).await
    }

    async fn transactional_update<F, T>(&self, id: &MatchId, mut update: F) -> Result<(MatchState, T), MatchError>
    where
        F: FnMut(&mut MatchState) -> Result<T, GameError> + Send,
        T: Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut tx = self.pool.begin().await?;
            let mut state =
                matches::fetch_match(id, &mut tx).await?.ok_or_else(|| MatchError::NotFound(id.clone()))?;
            let value = update(&mut state)?;
            let committed = match matches::update_match(&state, &mut tx).await {
                Ok(()) => tx.commit().await.map_err(MatchError::from),
                Err(e) => Err(e),
            };
            match committed {
                Ok(()) => {
                    self.watch.publish(&state);
                    return Ok((state, value));
                },
                Err(e) if attempts <= WRITE_CONFLICT_RETRIES && is_write_conflict(&e) => {
                    // A writer on another connection got there first. Re-read the state they
                    // committed and run the closure against it.
                    debug!("🗃️ Write conflict updating {id} (attempt {attempts}): {e}");
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn subscribe(&self, id: &MatchId) -> broadcast::Receiver<MatchState> {
        self.watch.subscribe(id)
    }

    async fn settle_match(&self, id: &MatchId, split: &PrizeSplit) -> Result<bool, MatchError> {
        let mut tx = self.pool.begin().await?;
        if !matches::mark_settled(id, &mut tx).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        let credit = LedgerOperation::game_credit(split.winner.clone(), id, split.winner_credit);
        ledger::apply_operation(&credit, &mut tx).await?;
        if let Some((referrer, amount)) = &split.commission {
            let commission = LedgerOperation::commission(referrer.clone(), &format!("commission:{id}"), *amount);
            ledger::apply_operation(&commission, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🗃️ Settled {id}: {} to {}, {} retained", split.winner_credit, split.winner, split.platform_retained);
        Ok(true)
    }

    async fn delete_match(&self, id: &MatchId) -> Result<(), MatchError> {
        let mut conn = self.pool.acquire().await?;
        matches::delete_match(id, &mut conn).await?;
        self.watch.forget(id);
        Ok(())
    }
}

impl MatchmakingManagement for SqliteDatabase {
    async fn join_queue(
        &self,
        stake: Money,
        account: &AccountId,
        display_name: &str,
    ) -> Result<(), MatchmakingError> {
        if !is_valid_stake(stake) {
            return Err(MatchmakingError::InvalidStake(stake));
        }
        let mut conn = self.pool.acquire().await?;
        queue::upsert_entry(stake, account, display_name, &mut conn).await
    }

    async fn leave_queue(&self, stake: Money, account: &AccountId) -> Result<(), MatchmakingError> {
        let mut conn = self.pool.acquire().await?;
        let _ = queue::remove_entry(stake, account, &mut conn).await?;
        Ok(())
    }

    async fn queued_players(&self, stake: Money) -> Result<Vec<QueueEntry>, MatchmakingError> {
        let mut conn = self.pool.acquire().await?;
        queue::entries_for_stake(stake, &mut conn).await
    }

    async fn create_match_from_queue(&self, new_match: NewMatch) -> Result<(MatchState, bool), MatchmakingError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = matches::fetch_match(&new_match.id, &mut tx).await? {
            // The other player created it first. The queue entries are already gone.
            tx.rollback().await?;
            return Ok((existing, false));
        }
        let creator = new_match.creator.0.clone();
        let joiner = new_match.joiner.0.clone();
        let stake = new_match.stake;
        if !queue::entry_exists(stake, &creator, &mut tx).await? ||
            !queue::entry_exists(stake, &joiner, &mut tx).await?
        {
            return Err(MatchmakingError::StaleQueue);
        }
        let mut state = new_match.into_state(Utc::now());
        self.charge_entry_fees(&mut state, &mut tx).await?;
        queue::remove_entry(stake, &creator, &mut tx).await?;
        queue::remove_entry(stake, &joiner, &mut tx).await?;
        if !matches::insert_match(&state, &mut tx).await? {
            drop(tx);
            let mut conn = self.pool.acquire().await?;
            let existing = matches::fetch_match(&state.id, &mut conn)
                .await?
                .ok_or_else(|| MatchError::NotFound(state.id.clone()))?;
            return Ok((existing, false));
        }
        tx.commit().await?;
        info!("🗃️ Created match {} at stake {} from the public queue", state.id, state.stake);
        Ok((state, true))
    }

    async fn create_room(
        &self,
        code: &str,
        creator: &AccountId,
        display_name: &str,
        stake: Money,
    ) -> Result<PrivateRoom, MatchmakingError> {
        if !is_valid_stake(stake) {
            return Err(MatchmakingError::InvalidStake(stake));
        }
        let mut conn = self.pool.acquire().await?;
        rooms::insert_room(code, creator, display_name, stake, &mut conn).await
    }

    async fn fetch_room(&self, code: &str) -> Result<Option<PrivateRoom>, MatchmakingError> {
        let mut conn = self.pool.acquire().await?;
        rooms::fetch_room(code, &mut conn).await
    }

    async fn join_room(
        &self,
        code: &str,
        joiner: &AccountId,
        display_name: &str,
    ) -> Result<PrivateRoom, MatchmakingError> {
        let mut conn = self.pool.acquire().await?;
        rooms::claim_joiner(code, joiner, display_name, &mut conn).await
    }

    async fn convert_room_to_match(&self, code: &str) -> Result<(MatchState, bool), MatchmakingError> {
        let mut tx = self.pool.begin().await?;
        let room = rooms::fetch_room(code, &mut tx).await?.ok_or_else(|| MatchmakingError::RoomNotFound(code.to_string()))?;
        let (joiner_id, joiner_name) = room
            .joiner_id
            .zip(room.joiner_name)
            .ok_or_else(|| MatchmakingError::RoomUnavailable(code.to_string()))?;
        let new_match =
            NewMatch::new(room.stake, (room.creator_id, room.creator_name), (joiner_id, joiner_name), true);
        if let Some(existing) = matches::fetch_match(&new_match.id, &mut tx).await? {
            rooms::delete_room(code, &mut tx).await?;
            tx.commit().await?;
            return Ok((existing, false));
        }
        let mut state = new_match.into_state(Utc::now());
        self.charge_entry_fees(&mut state, &mut tx).await?;
        rooms::delete_room(code, &mut tx).await?;
        if !matches::insert_match(&state, &mut tx).await? {
            drop(tx);
            let mut conn = self.pool.acquire().await?;
            let existing = matches::fetch_match(&state.id, &mut conn)
                .await?
                .ok_or_else(|| MatchError::NotFound(state.id.clone()))?;
            return Ok((existing, false));
        }
        tx.commit().await?;
        info!("🗃️ Converted room {code} into match {}", state.id);
        Ok((state, true))
    }

    async fn delete_room(&self, code: &str) -> Result<(), MatchmakingError> {
        let mut conn = self.pool.acquire().await?;
        rooms::delete_room(code, &mut conn).await
    }
}
