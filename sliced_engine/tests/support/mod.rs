//! Shared scaffolding for the engine integration tests. Every test runs against a fresh
//! in-memory database, so the pool is pinned to a single connection.
#![allow(dead_code)]

use sliced_common::Money;
use sliced_engine::{
    db_types::{AccountId, NewAccount},
    traits::{LedgerManagement, LedgerOperation},
    SqliteDatabase,
};

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating database")
}

pub async fn register(db: &SqliteDatabase, id: &str, name: &str) -> AccountId {
    let account = db.upsert_account(NewAccount::new(id.into(), name.to_string())).await.expect("Error registering");
    account.id
}

pub async fn register_referred(db: &SqliteDatabase, id: &str, name: &str, referrer: &AccountId) -> AccountId {
    let new_account = NewAccount::new(id.into(), name.to_string()).with_referrer(referrer.clone());
    let account = db.upsert_account(new_account).await.expect("Error registering");
    account.id
}

/// Seeds a balance through a deposit so the ledger stays the full story of every balance.
pub async fn fund(db: &SqliteDatabase, account: &AccountId, amount: Money) {
    let reference = format!("seed_{account}");
    let op = LedgerOperation::deposit(account.clone(), &reference, amount);
    let outcome = db.apply_operation(op).await.expect("Error funding account");
    assert!(outcome.applied);
}
