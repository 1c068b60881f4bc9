use sliced_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, AccountId, LedgerEntry, LedgerOutcome, NewAccount},
    traits::{LedgerError, LedgerOperation},
};

pub async fn upsert_account(account: &NewAccount, conn: &mut SqliteConnection) -> Result<Account, LedgerError> {
    let result = sqlx::query_as::<_, Account>(
        r#"
            INSERT INTO accounts (id, display_name, referred_by) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                referred_by = COALESCE(accounts.referred_by, excluded.referred_by),
                updated_at = CURRENT_TIMESTAMP
            RETURNING *
        "#,
    )
    .bind(&account.id)
    .bind(&account.display_name)
    .bind(&account.referred_by)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

pub async fn fetch_account(id: &AccountId, conn: &mut SqliteConnection) -> Result<Option<Account>, LedgerError> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

pub async fn fetch_balance(id: &AccountId, conn: &mut SqliteConnection) -> Result<Money, LedgerError> {
    sqlx::query_scalar::<_, Money>("SELECT balance FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
}

/// Applies a ledger operation on the given connection. Callers that need atomicity with other
/// statements pass a transaction; [`SqliteDatabase`](crate::SqliteDatabase) always does.
///
/// Replays (an entry with the same account, reference and kind already committed) return
/// `applied == false` and write nothing, so rolling the surrounding transaction back is safe.
pub async fn apply_operation(
    op: &LedgerOperation,
    conn: &mut SqliteConnection,
) -> Result<LedgerOutcome, LedgerError> {
    if entry_exists(op, &mut *conn).await? {
        let balance = fetch_balance(&op.account_id, conn).await?;
        return Ok(LedgerOutcome { applied: false, new_balance: balance });
    }
    let account =
        fetch_account(&op.account_id, &mut *conn).await?.ok_or_else(|| LedgerError::AccountNotFound(op.account_id.clone()))?;
    if account.disabled {
        return Err(LedgerError::AccountDisabled(op.account_id.clone()));
    }
    // The balance guard lives in the UPDATE itself, so a concurrent debit cannot sneak the
    // balance below zero between a check and the write.
    let new_balance = sqlx::query_scalar::<_, Money>(
        r#"
            UPDATE accounts SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND balance + $1 >= 0
            RETURNING balance
        "#,
    )
    .bind(op.delta.value())
    .bind(&op.account_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| LedgerError::InsufficientFunds {
        account_id: op.account_id.clone(),
        requested: -op.delta,
        balance: account.balance,
    })?;
    match insert_entry(op, new_balance, conn).await? {
        Some(_) => Ok(LedgerOutcome { applied: true, new_balance }),
        // Lost a race with an identical operation. The caller's rollback undoes our UPDATE.
        None => Ok(LedgerOutcome { applied: false, new_balance: account.balance }),
    }
}

async fn entry_exists(op: &LedgerOperation, conn: &mut SqliteConnection) -> Result<bool, LedgerError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM ledger_entries WHERE account_id = $1 AND external_ref = $2 AND kind = $3",
    )
    .bind(&op.account_id)
    .bind(&op.external_ref)
    .bind(op.kind)
    .fetch_optional(conn)
    .await?;
    Ok(found.is_some())
}

/// Returns `None` when an identical entry already exists.
async fn insert_entry(
    op: &LedgerOperation,
    balance_after: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, LedgerError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
            INSERT INTO ledger_entries (account_id, external_ref, kind, delta, balance_after)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        "#,
    )
    .bind(&op.account_id)
    .bind(&op.external_ref)
    .bind(op.kind)
    .bind(op.delta)
    .bind(balance_after)
    .fetch_one(conn)
    .await;
    match entry {
        Ok(entry) => Ok(Some(entry)),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn history(
    id: &AccountId,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE account_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
