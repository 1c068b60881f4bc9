//! Live match operations: moves, timers, heartbeats, disconnect claims and settlement.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use rand::Rng;
use tokio::sync::broadcast;

use crate::{
    api::settlement::SettlementEngine,
    db_types::{AccountId, LedgerOutcome, MatchId, MatchState, MatchStatus, Symbol},
    events::{EventProducers, MatchSettledEvent},
    game::{MoveOutcome, SUDDEN_DEATH_CELLS},
    traits::{LedgerManagement, LedgerOperation, MatchError, MatchManagement, PrizeSplit},
};

/// `MatchFlowApi` drives everything that happens to a match between creation and deletion.
///
/// Every transition runs inside the backend's transactional update, so concurrent claims from the
/// two clients serialise cleanly. Transitions that finish the match settle it before returning;
/// settlement is idempotent, so a crash between the two steps only delays the payout until the
/// next poll of the finished match.
pub struct MatchFlowApi<B> {
    db: B,
    settlement: SettlementEngine,
    producers: EventProducers,
}

impl<B> Debug for MatchFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchFlowApi")
    }
}

impl<B> MatchFlowApi<B> {
    pub fn new(db: B, settlement: SettlementEngine, producers: EventProducers) -> Self {
        Self { db, settlement, producers }
    }
}

impl<B> MatchFlowApi<B>
where B: MatchManagement + LedgerManagement
{
    pub async fn fetch_match(&self, id: &MatchId) -> Result<Option<MatchState>, MatchError> {
        self.db.fetch_match(id).await
    }

    pub async fn find_match_for(&self, account: &AccountId) -> Result<Option<MatchState>, MatchError> {
        self.db.find_match_for(account).await
    }

    pub fn subscribe(&self, id: &MatchId) -> broadcast::Receiver<MatchState> {
        self.db.subscribe(id)
    }

    /// Places a mark for `mover`. If the move decides the series the match is settled before this
    /// returns.
    pub async fn submit_move(
        &self,
        id: &MatchId,
        mover: &AccountId,
        cell: usize,
    ) -> Result<(MatchState, MoveOutcome), MatchError> {
        // Drawn ahead of the closure: the backend may run it more than once, and the target must
        // not change if it does.
        let pick = rand::thread_rng().gen_range(0..SUDDEN_DEATH_CELLS);
        let now = Utc::now();
        let (state, outcome) =
            self.db.transactional_update(id, |state| state.apply_move(mover, cell, pick, now)).await?;
        if let MoveOutcome::SeriesWon(symbol) = outcome {
            debug!("🎮️ {mover} ({symbol}) took the series in {id}");
            self.maybe_settle(&state).await?;
        }
        Ok((state, outcome))
    }

    /// Forfeits an expired turn. The stale side of a double claim gets `false` back.
    pub async fn pass_turn(&self, id: &MatchId, expired_turn: Symbol) -> Result<(MatchState, bool), MatchError> {
        let now = Utc::now();
        self.db.transactional_update(id, |state| Ok(state.pass_turn(expired_turn, now))).await
    }

    pub async fn heartbeat(&self, id: &MatchId, account: &AccountId) -> Result<MatchState, MatchError> {
        let now = Utc::now();
        let (state, _) =
            self.db.transactional_update(id, |state| state.record_heartbeat(account, now).map(|_| ())).await?;
        Ok(state)
    }

    pub async fn mark_offline(&self, id: &MatchId, account: &AccountId) -> Result<MatchState, MatchError> {
        let (state, _) = self.db.transactional_update(id, |state| state.mark_offline(account).map(|_| ())).await?;
        Ok(state)
    }

    /// A sudden-death grid click. `true` means this claimant hit the target first and the match
    /// has been settled in their favour.
    pub async fn claim_sudden_death(
        &self,
        id: &MatchId,
        claimant: &AccountId,
        cell: u8,
    ) -> Result<(MatchState, bool), MatchError> {
        let (state, won) = self.db.transactional_update(id, |state| state.claim_sudden_death(claimant, cell)).await?;
        if won {
            info!("🎮️ {claimant} hit the sudden-death target in {id}");
            self.maybe_settle(&state).await?;
        }
        Ok((state, won))
    }

    /// Claims the match because the opponent disconnected or stopped heartbeating.
    pub async fn claim_disconnect_win(
        &self,
        id: &MatchId,
        claimant: &AccountId,
    ) -> Result<(MatchState, bool), MatchError> {
        let now = Utc::now();
        let (state, won) =
            self.db.transactional_update(id, |state| state.claim_disconnect_win(claimant, now)).await?;
        if won {
            info!("🎮️ {claimant} wins {id} by opponent disconnect");
            self.maybe_settle(&state).await?;
        }
        Ok((state, won))
    }

    /// Takes a player's entry fee for the match, derived server-side as half the stake. Replays
    /// are absorbed by the ledger, so a client retrying this endpoint cannot be charged twice.
    pub async fn charge_entry(&self, id: &MatchId, account: &AccountId) -> Result<LedgerOutcome, MatchError> {
        let state = self.db.fetch_match(id).await?.ok_or_else(|| MatchError::NotFound(id.clone()))?;
        let slot = state
            .slot_index(account)
            .ok_or_else(|| MatchError::Rules(crate::game::GameError::NotAParticipant(account.clone())))?;
        let op = LedgerOperation::game_charge(account.clone(), id, state.entry_fee());
        let outcome = self.db.apply_operation(op).await?;
        if !state.entry_charged[slot] {
            let _ = self
                .db
                .transactional_update(id, |state| {
                    state.entry_charged[slot] = true;
                    Ok(())
                })
                .await?;
        }
        Ok(outcome)
    }

    /// Settles a finished match exactly once: computes the split, credits the winner (and the
    /// winner's referrer, per policy), emits the settled event and deletes the match row.
    /// Returns the split if this call did the settling.
    pub async fn maybe_settle(&self, state: &MatchState) -> Result<Option<PrizeSplit>, MatchError> {
        if state.status != MatchStatus::Finished {
            return Ok(None);
        }
        let (Some(winner), Some(reason)) = (&state.winner, state.win_reason) else {
            return Ok(None);
        };
        let referrer = self.db.fetch_account(winner).await?.and_then(|a| a.referred_by);
        let split = self.settlement.compute_split(state.stake, winner, referrer.as_ref());
        if !self.db.settle_match(&state.id, &split).await? {
            return Ok(None);
        }
        let event = MatchSettledEvent::new(state.id.clone(), split.clone(), reason);
        for producer in &self.producers.match_settled_producer {
            producer.publish_event(event.clone()).await;
        }
        self.db.delete_match(&state.id).await?;
        Ok(Some(split))
    }
}
