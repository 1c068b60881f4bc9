//! Pure match rules. Nothing in this module touches the database; every transition is a plain
//! method on [`MatchState`] so the repository can run it inside a transactional update and the
//! tests can drive it directly.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db_types::{AccountId, MatchState, MatchStatus, Symbol, WinReason};

/// A player forfeits the turn if no move lands within this window.
pub const TURN_LIMIT_SECS: i64 = 10;
/// Clients send a liveness ping on this cadence while a match is running.
pub const HEARTBEAT_INTERVAL_SECS: i64 = 3;
/// A player whose last heartbeat is older than this is treated as disconnected.
pub const HEARTBEAT_STALE_SECS: i64 = 8;
/// Rounds in the series.
pub const MAX_ROUNDS: u8 = 3;
/// Round wins needed to take the series outright.
pub const SERIES_TARGET: u8 = 2;
/// Size of the sudden-death grid. The target index is drawn from `0..SUDDEN_DEATH_CELLS`.
pub const SUDDEN_DEATH_CELLS: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Account {0} is not a participant in this match")]
    NotAParticipant(AccountId),
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("Cell {0} is out of range")]
    InvalidCell(usize),
    #[error("Cell {0} is already occupied")]
    CellOccupied(usize),
    #[error("The match is already finished")]
    MatchFinished,
    #[error("Board moves are not accepted in the {0} phase")]
    WrongPhase(MatchStatus),
    #[error("The match is not in sudden death")]
    NotInSuddenDeath,
    #[error("The opponent is still connected")]
    OpponentStillConnected,
}

/// What a successful board move did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The mark was placed and the turn passed to the opponent.
    Placed,
    /// The mover completed a line. A fresh round has started.
    RoundWon(Symbol),
    /// The board filled with no line. A fresh round has started.
    RoundDrawn,
    /// The series is decided and the match is finished.
    SeriesWon(Symbol),
    /// The series ended level after the final round. The match is now in sudden death.
    SuddenDeathStarted,
}

impl MatchState {
    /// Place `mover`'s mark on `cell` and advance the match. `sudden_death_pick` is the target
    /// index to use if this move ends the series level; it is only consumed on that transition, so
    /// the target is still set exactly once per match.
    pub fn apply_move(
        &mut self,
        mover: &AccountId,
        cell: usize,
        sudden_death_pick: u8,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, GameError> {
        match self.status {
            MatchStatus::Active => {},
            MatchStatus::Finished => return Err(GameError::MatchFinished),
            s => return Err(GameError::WrongPhase(s)),
        }
        let symbol = self.symbol_of(mover).ok_or_else(|| GameError::NotAParticipant(mover.clone()))?;
        if self.current_turn != symbol {
            return Err(GameError::NotYourTurn);
        }
        if cell >= 9 {
            return Err(GameError::InvalidCell(cell));
        }
        if self.board.cell(cell).is_some() {
            return Err(GameError::CellOccupied(cell));
        }
        self.board.set(cell, symbol);
        self.last_move_at = now;
        if let Some(winner) = self.board.winner() {
            Ok(self.finish_round(Some(winner), sudden_death_pick))
        } else if self.board.is_full() {
            Ok(self.finish_round(None, sudden_death_pick))
        } else {
            self.current_turn = symbol.other();
            Ok(MoveOutcome::Placed)
        }
    }

    fn finish_round(&mut self, round_winner: Option<Symbol>, sudden_death_pick: u8) -> MoveOutcome {
        if let Some(winner) = round_winner {
            match winner {
                Symbol::X => self.score_x += 1,
                Symbol::O => self.score_o += 1,
            }
            if self.score_of(winner) >= SERIES_TARGET {
                return self.finish_series(winner);
            }
        }
        if self.round >= MAX_ROUNDS {
            if self.score_x != self.score_o {
                let leader = if self.score_x > self.score_o { Symbol::X } else { Symbol::O };
                return self.finish_series(leader);
            }
            self.status = MatchStatus::SuddenDeath;
            self.sudden_death_target = Some(sudden_death_pick % SUDDEN_DEATH_CELLS);
            self.board.clear();
            return MoveOutcome::SuddenDeathStarted;
        }
        let outcome = match round_winner {
            Some(winner) => MoveOutcome::RoundWon(winner),
            None => MoveOutcome::RoundDrawn,
        };
        self.round += 1;
        self.board.clear();
        self.current_turn = Symbol::X;
        outcome
    }

    fn finish_series(&mut self, winner: Symbol) -> MoveOutcome {
        self.status = MatchStatus::Finished;
        self.winner = Some(self.player_by_symbol(winner).account_id.clone());
        self.win_reason = Some(WinReason::SeriesWin);
        MoveOutcome::SeriesWon(winner)
    }

    /// Forfeit the turn of `expected_turn` because its timer ran out. Returns `false` without
    /// touching the match when the claim is stale, i.e. the turn already changed hands, the match
    /// left the `Active` phase, or the timer has not actually expired.
    pub fn pass_turn(&mut self, expected_turn: Symbol, now: DateTime<Utc>) -> bool {
        if self.status != MatchStatus::Active || self.current_turn != expected_turn {
            return false;
        }
        if now - self.last_move_at < Duration::seconds(TURN_LIMIT_SECS) {
            return false;
        }
        self.current_turn = expected_turn.other();
        self.last_move_at = now;
        true
    }

    /// First correct click wins the whole match. Returns `false` for a click on a non-target cell
    /// or for a claim that arrives after the opponent already hit the target.
    pub fn claim_sudden_death(&mut self, claimant: &AccountId, cell: u8) -> Result<bool, GameError> {
        if self.slot_index(claimant).is_none() {
            return Err(GameError::NotAParticipant(claimant.clone()));
        }
        match self.status {
            MatchStatus::SuddenDeath => {},
            MatchStatus::Finished => return Ok(false),
            _ => return Err(GameError::NotInSuddenDeath),
        }
        if self.sudden_death_target != Some(cell) {
            return Ok(false);
        }
        self.status = MatchStatus::Finished;
        self.winner = Some(claimant.clone());
        self.win_reason = Some(WinReason::SuddenDeath);
        Ok(true)
    }

    pub fn record_heartbeat(&mut self, account: &AccountId, now: DateTime<Utc>) -> Result<(), GameError> {
        let i = self.slot_index(account).ok_or_else(|| GameError::NotAParticipant(account.clone()))?;
        self.players[i].heartbeat_at = now;
        self.players[i].online = true;
        Ok(())
    }

    pub fn mark_offline(&mut self, account: &AccountId) -> Result<(), GameError> {
        let i = self.slot_index(account).ok_or_else(|| GameError::NotAParticipant(account.clone()))?;
        self.players[i].online = false;
        Ok(())
    }

    /// Award the match to `claimant` because the opponent went away. The claim only succeeds when
    /// the opponent has explicitly disconnected or its heartbeat has gone stale; a finished match
    /// absorbs the claim as a no-op.
    pub fn claim_disconnect_win(&mut self, claimant: &AccountId, now: DateTime<Utc>) -> Result<bool, GameError> {
        let i = self.slot_index(claimant).ok_or_else(|| GameError::NotAParticipant(claimant.clone()))?;
        if self.status == MatchStatus::Finished {
            return Ok(false);
        }
        let opponent = &self.players[1 - i];
        let stale = now - opponent.heartbeat_at >= Duration::seconds(HEARTBEAT_STALE_SECS);
        if opponent.online && !stale {
            return Err(GameError::OpponentStillConnected);
        }
        self.status = MatchStatus::Finished;
        self.winner = Some(claimant.clone());
        self.win_reason = Some(WinReason::OpponentDisconnected);
        Ok(true)
    }
}
