use sliced_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AccountId, PrivateRoom},
    traits::MatchmakingError,
};

pub async fn insert_room(
    code: &str,
    creator: &AccountId,
    display_name: &str,
    stake: Money,
    conn: &mut SqliteConnection,
) -> Result<PrivateRoom, MatchmakingError> {
    let room = sqlx::query_as::<_, PrivateRoom>(
        r#"
            INSERT INTO private_rooms (code, creator_id, creator_name, stake, status)
            VALUES ($1, $2, $3, $4, 'Waiting')
            RETURNING *
        "#,
    )
    .bind(code)
    .bind(creator)
    .bind(display_name)
    .bind(stake)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => MatchmakingError::RoomCodeTaken(code.to_string()),
        _ => MatchmakingError::from(e),
    })?;
    Ok(room)
}

pub async fn fetch_room(code: &str, conn: &mut SqliteConnection) -> Result<Option<PrivateRoom>, MatchmakingError> {
    let room = sqlx::query_as::<_, PrivateRoom>("SELECT * FROM private_rooms WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(room)
}

/// Claims the joiner slot. The status guard in the UPDATE means exactly one of two racing
/// joiners gets the room.
pub async fn claim_joiner(
    code: &str,
    joiner: &AccountId,
    display_name: &str,
    conn: &mut SqliteConnection,
) -> Result<PrivateRoom, MatchmakingError> {
    let room = sqlx::query_as::<_, PrivateRoom>(
        r#"
            UPDATE private_rooms SET joiner_id = $1, joiner_name = $2, status = 'Full'
            WHERE code = $3 AND status = 'Waiting'
            RETURNING *
        "#,
    )
    .bind(joiner)
    .bind(display_name)
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;
    match room {
        Some(room) => Ok(room),
        None => match fetch_room(code, conn).await? {
            Some(_) => Err(MatchmakingError::RoomUnavailable(code.to_string())),
            None => Err(MatchmakingError::RoomNotFound(code.to_string())),
        },
    }
}

pub async fn delete_room(code: &str, conn: &mut SqliteConnection) -> Result<(), MatchmakingError> {
    sqlx::query("DELETE FROM private_rooms WHERE code = $1").bind(code).execute(conn).await?;
    Ok(())
}
