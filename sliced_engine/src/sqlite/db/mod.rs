//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, maintained as simple functions (rather than stateful structs)
//! that accept a `&mut SqliteConnection`. Callers obtain a connection from a pool, or open a
//! transaction when several calls must commit or fail together, and call through without any
//! other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod ledger;
pub mod matches;
pub mod queue;
pub mod rooms;

const SQLITE_DB_URL: &str = "sqlite://data/sliced.db";

pub fn db_url() -> String {
    let result = env::var("SLICED_DATABASE_URL").unwrap_or_else(|_| {
        info!("SLICED_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        balance INTEGER NOT NULL DEFAULT 0,
        referred_by TEXT,
        disabled INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ledger_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id TEXT NOT NULL REFERENCES accounts (id),
        external_ref TEXT NOT NULL,
        kind TEXT NOT NULL,
        delta INTEGER NOT NULL,
        balance_after INTEGER NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (account_id, external_ref, kind)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS matches (
        id TEXT PRIMARY KEY,
        stake INTEGER NOT NULL,
        status TEXT NOT NULL,
        board TEXT NOT NULL,
        current_turn TEXT NOT NULL,
        last_move_at DATETIME NOT NULL,
        round INTEGER NOT NULL,
        score_x INTEGER NOT NULL,
        score_o INTEGER NOT NULL,
        sudden_death_target INTEGER,
        winner_account_id TEXT,
        win_reason TEXT,
        p1_id TEXT NOT NULL,
        p1_name TEXT NOT NULL,
        p1_heartbeat_at DATETIME NOT NULL,
        p1_online INTEGER NOT NULL,
        p2_id TEXT NOT NULL,
        p2_name TEXT NOT NULL,
        p2_heartbeat_at DATETIME NOT NULL,
        p2_online INTEGER NOT NULL,
        entry_charged_p1 INTEGER NOT NULL DEFAULT 0,
        entry_charged_p2 INTEGER NOT NULL DEFAULT 0,
        prize_credited INTEGER NOT NULL DEFAULT 0,
        is_private INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS queue_entries (
        stake INTEGER NOT NULL,
        account_id TEXT NOT NULL,
        display_name TEXT NOT NULL,
        enqueued_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (stake, account_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS private_rooms (
        code TEXT PRIMARY KEY,
        creator_id TEXT NOT NULL,
        creator_name TEXT NOT NULL,
        stake INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'Waiting',
        joiner_id TEXT,
        joiner_name TEXT,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
];

/// Creates any missing tables. Run once at startup; also how the in-memory test databases are
/// prepared.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), SqlxError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
