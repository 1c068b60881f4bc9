use chrono::{DateTime, Utc};
use sliced_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{AccountId, MatchId, MatchState, PlayerSlot, Symbol, WinReason},
    traits::MatchError,
};

/// The flat persisted form of a match. Enum and board columns are stored as their display
/// strings; [`TryFrom`] rebuilds the structured [`MatchState`].
#[derive(Debug, Clone, FromRow)]
struct MatchRow {
    id: String,
    stake: Money,
    status: String,
    board: String,
    current_turn: String,
    last_move_at: DateTime<Utc>,
    round: i64,
    score_x: i64,
    score_o: i64,
    sudden_death_target: Option<i64>,
    winner_account_id: Option<String>,
    win_reason: Option<String>,
    p1_id: String,
    p1_name: String,
    p1_heartbeat_at: DateTime<Utc>,
    p1_online: bool,
    p2_id: String,
    p2_name: String,
    p2_heartbeat_at: DateTime<Utc>,
    p2_online: bool,
    entry_charged_p1: bool,
    entry_charged_p2: bool,
    prize_credited: bool,
    is_private: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for MatchState {
    type Error = MatchError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::db_types::ConversionError| MatchError::DatabaseError(e.to_string());
        Ok(MatchState {
            id: MatchId::from(row.id),
            stake: row.stake,
            status: row.status.parse().map_err(corrupt)?,
            board: row.board.parse().map_err(corrupt)?,
            current_turn: row.current_turn.parse().map_err(corrupt)?,
            last_move_at: row.last_move_at,
            round: row.round as u8,
            score_x: row.score_x as u8,
            score_o: row.score_o as u8,
            sudden_death_target: row.sudden_death_target.map(|t| t as u8),
            winner: row.winner_account_id.map(AccountId::from),
            win_reason: row.win_reason.map(|r| r.parse::<WinReason>().map_err(corrupt)).transpose()?,
            players: [
                PlayerSlot {
                    account_id: AccountId::from(row.p1_id),
                    display_name: row.p1_name,
                    symbol: Symbol::X,
                    heartbeat_at: row.p1_heartbeat_at,
                    online: row.p1_online,
                },
                PlayerSlot {
                    account_id: AccountId::from(row.p2_id),
                    display_name: row.p2_name,
                    symbol: Symbol::O,
                    heartbeat_at: row.p2_heartbeat_at,
                    online: row.p2_online,
                },
            ],
            entry_charged: [row.entry_charged_p1, row.entry_charged_p2],
            prize_credited: row.prize_credited,
            is_private: row.is_private,
            created_at: row.created_at,
        })
    }
}

/// Returns `false` when a match with this id already exists.
pub async fn insert_match(state: &MatchState, conn: &mut SqliteConnection) -> Result<bool, MatchError> {
    let result = sqlx::query(
        r#"
            INSERT INTO matches (
                id, stake, status, board, current_turn, last_move_at, round, score_x, score_o,
                sudden_death_target, winner_account_id, win_reason,
                p1_id, p1_name, p1_heartbeat_at, p1_online,
                p2_id, p2_name, p2_heartbeat_at, p2_online,
                entry_charged_p1, entry_charged_p2, prize_credited, is_private, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
        "#,
    )
    .bind(state.id.as_str())
    .bind(state.stake)
    .bind(state.status.to_string())
    .bind(state.board.to_string())
    .bind(state.current_turn.to_string())
    .bind(state.last_move_at)
    .bind(state.round as i64)
    .bind(state.score_x as i64)
    .bind(state.score_o as i64)
    .bind(state.sudden_death_target.map(|t| t as i64))
    .bind(state.winner.as_ref().map(|w| w.to_string()))
    .bind(state.win_reason.map(|r| r.to_string()))
    .bind(state.players[0].account_id.as_str())
    .bind(&state.players[0].display_name)
    .bind(state.players[0].heartbeat_at)
    .bind(state.players[0].online)
    .bind(state.players[1].account_id.as_str())
    .bind(&state.players[1].display_name)
    .bind(state.players[1].heartbeat_at)
    .bind(state.players[1].online)
    .bind(state.entry_charged[0])
    .bind(state.entry_charged[1])
    .bind(state.prize_credited)
    .bind(state.is_private)
    .bind(state.created_at)
    .execute(conn)
    .await;
    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_match(id: &MatchId, conn: &mut SqliteConnection) -> Result<Option<MatchState>, MatchError> {
    let row = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.map(MatchState::try_from).transpose()
}

pub async fn find_match_for(
    account: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchState>, MatchError> {
    let row = sqlx::query_as::<_, MatchRow>(
        r#"
            SELECT * FROM matches
            WHERE (p1_id = $1 OR p2_id = $1) AND status != 'Finished'
            ORDER BY created_at DESC LIMIT 1
        "#,
    )
    .bind(account)
    .fetch_optional(conn)
    .await?;
    row.map(MatchState::try_from).transpose()
}

/// Writes back every column a rule transition may touch. Immutable columns (stake, players,
/// created_at) are left alone.
pub async fn update_match(state: &MatchState, conn: &mut SqliteConnection) -> Result<(), MatchError> {
    let result = sqlx::query(
        r#"
            UPDATE matches SET
                status = $1, board = $2, current_turn = $3, last_move_at = $4,
                round = $5, score_x = $6, score_o = $7, sudden_death_target = $8,
                winner_account_id = $9, win_reason = $10,
                p1_heartbeat_at = $11, p1_online = $12, p2_heartbeat_at = $13, p2_online = $14,
                entry_charged_p1 = $15, entry_charged_p2 = $16
            WHERE id = $17
        "#,
    )
    .bind(state.status.to_string())
    .bind(state.board.to_string())
    .bind(state.current_turn.to_string())
    .bind(state.last_move_at)
    .bind(state.round as i64)
    .bind(state.score_x as i64)
    .bind(state.score_o as i64)
    .bind(state.sudden_death_target.map(|t| t as i64))
    .bind(state.winner.as_ref().map(|w| w.to_string()))
    .bind(state.win_reason.map(|r| r.to_string()))
    .bind(state.players[0].heartbeat_at)
    .bind(state.players[0].online)
    .bind(state.players[1].heartbeat_at)
    .bind(state.players[1].online)
    .bind(state.entry_charged[0])
    .bind(state.entry_charged[1])
    .bind(state.id.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(MatchError::NotFound(state.id.clone()));
    }
    Ok(())
}

/// Flips the settled flag, but only for a finished, unsettled match. The caller keys the actual
/// payout off the returned `true`, so the prize moves at most once.
pub async fn mark_settled(id: &MatchId, conn: &mut SqliteConnection) -> Result<bool, MatchError> {
    let result = sqlx::query(
        "UPDATE matches SET prize_credited = 1 WHERE id = $1 AND status = 'Finished' AND prize_credited = 0",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_match(id: &MatchId, conn: &mut SqliteConnection) -> Result<(), MatchError> {
    sqlx::query("DELETE FROM matches WHERE id = $1").bind(id).execute(conn).await?;
    Ok(())
}
