use sliced_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AccountId, QueueEntry},
    traits::MatchmakingError,
};

/// Joining a queue you are already in just refreshes the entry.
pub async fn upsert_entry(
    stake: Money,
    account: &AccountId,
    display_name: &str,
    conn: &mut SqliteConnection,
) -> Result<(), MatchmakingError> {
    sqlx::query(
        r#"
            INSERT INTO queue_entries (stake, account_id, display_name) VALUES ($1, $2, $3)
            ON CONFLICT (stake, account_id) DO UPDATE SET
                display_name = excluded.display_name,
                enqueued_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(stake)
    .bind(account)
    .bind(display_name)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn remove_entry(
    stake: Money,
    account: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<bool, MatchmakingError> {
    let result = sqlx::query("DELETE FROM queue_entries WHERE stake = $1 AND account_id = $2")
        .bind(stake)
        .bind(account)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn entry_exists(
    stake: Money,
    account: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<bool, MatchmakingError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM queue_entries WHERE stake = $1 AND account_id = $2")
            .bind(stake)
            .bind(account)
            .fetch_optional(conn)
            .await?;
    Ok(found.is_some())
}

pub async fn entries_for_stake(stake: Money, conn: &mut SqliteConnection) -> Result<Vec<QueueEntry>, MatchmakingError> {
    let entries = sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM queue_entries WHERE stake = $1 ORDER BY enqueued_at ASC, account_id ASC",
    )
    .bind(stake)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
