use sliced_common::Money;
use thiserror::Error;

use crate::{
    db_types::{Account, AccountId, LedgerEntry, LedgerOutcome, NewAccount},
    traits::LedgerOperation,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Account {0} is disabled")]
    AccountDisabled(AccountId),
    #[error("Insufficient funds on {account_id}: tried to take {requested}, balance is {balance}")]
    InsufficientFunds { account_id: AccountId, requested: Money, balance: Money },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The wallet backend. Balances only ever move through [`apply_operation`], which writes the
/// guarded balance update and the ledger entry in one transaction, so the ledger is a complete
/// explanation of every balance and a replayed operation can never double-apply.
///
/// [`apply_operation`]: LedgerManagement::apply_operation
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// Creates the account if the id is new, otherwise refreshes the display name and referrer.
    /// The balance is never touched here.
    async fn upsert_account(&self, account: NewAccount) -> Result<Account, LedgerError>;

    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;

    /// Applies `op` exactly once.
    ///
    /// A repeat of an already-applied operation (same account, external reference and kind)
    /// returns `applied == false` with the current balance and changes nothing. A debit that
    /// would push the balance negative fails with [`LedgerError::InsufficientFunds`] and
    /// changes nothing.
    async fn apply_operation(&self, op: LedgerOperation) -> Result<LedgerOutcome, LedgerError>;

    async fn balance(&self, id: &AccountId) -> Result<Money, LedgerError>;

    /// The most recent ledger entries for the account, newest first.
    async fn history_for_account(&self, id: &AccountId, limit: i64) -> Result<Vec<LedgerEntry>, LedgerError>;
}
