//! Deposits, withdrawals, balances and ledger history.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use sliced_common::Money;
use thiserror::Error;

use crate::{
    api::settlement::CommissionPolicy,
    db_types::{Account, AccountId, ChargeStatus, LedgerEntry, LedgerOutcome, NewAccount},
    events::{EventProducers, PaymentStatusEvent},
    traits::{LedgerError, LedgerManagement, LedgerOperation},
};

/// Withdrawals below R$20.00 are rejected outright.
pub fn min_withdrawal() -> Money {
    Money::from_reais(20)
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Withdrawals below {0} are not accepted")]
    BelowMinimum(Money),
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A charge status as verified against the gateway. Routes must never build one of these from the
/// webhook body alone; the body only names the charge to look up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeUpdate {
    pub charge_id: String,
    pub account_id: AccountId,
    pub status: ChargeStatus,
    pub amount: Money,
}

/// The `WalletApi` is the only way money enters or leaves the platform.
pub struct WalletApi<B> {
    db: B,
    policy: CommissionPolicy,
    producers: EventProducers,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B, policy: CommissionPolicy, producers: EventProducers) -> Self {
        Self { db, policy, producers }
    }
}

impl<B> WalletApi<B>
where B: LedgerManagement
{
    pub async fn register_account(&self, account: NewAccount) -> Result<Account, WalletApiError> {
        let account = self.db.upsert_account(account).await?;
        debug!("🧑️ Registered or refreshed account {}", account.id);
        Ok(account)
    }

    pub async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, WalletApiError> {
        Ok(self.db.fetch_account(id).await?)
    }

    pub async fn balance(&self, id: &AccountId) -> Result<Money, WalletApiError> {
        Ok(self.db.balance(id).await?)
    }

    pub async fn history(&self, id: &AccountId, limit: i64) -> Result<Vec<LedgerEntry>, WalletApiError> {
        Ok(self.db.history_for_account(id, limit).await?)
    }

    /// Credits a verified gateway charge. Approved charges are applied at most once, keyed on the
    /// charge id; a redelivered webhook reports `applied == false`. Non-approved statuses only
    /// fire the status event.
    ///
    /// If the depositor was referred and the active policy pays a flat deposit bonus, the bonus
    /// lands on the referrer's ledger keyed on the same charge, so redeliveries cannot double-pay
    /// it either.
    pub async fn process_charge_update(&self, update: ChargeUpdate) -> Result<Option<LedgerOutcome>, WalletApiError> {
        let outcome = match update.status {
            ChargeStatus::Approved => {
                if update.amount <= Money::default() {
                    return Err(WalletApiError::NonPositiveAmount(update.amount));
                }
                let op = LedgerOperation::deposit(update.account_id.clone(), &update.charge_id, update.amount);
                let outcome = self.db.apply_operation(op).await?;
                if outcome.applied {
                    info!("🔄️ Deposit of {} applied for {} (charge {})", update.amount, update.account_id, update.charge_id);
                    self.pay_deposit_bonus(&update).await?;
                } else {
                    debug!("🔄️ Charge {} was already credited. Ignoring redelivery.", update.charge_id);
                }
                Some(outcome)
            },
            status => {
                debug!("🔄️ Charge {} reported as {status}. No balance change.", update.charge_id);
                None
            },
        };
        let applied = outcome.map(|o| o.applied).unwrap_or(false);
        let event = PaymentStatusEvent::new(
            update.charge_id,
            update.account_id,
            update.status,
            update.amount,
            applied,
        );
        for producer in &self.producers.payment_status_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(outcome)
    }

    async fn pay_deposit_bonus(&self, update: &ChargeUpdate) -> Result<(), WalletApiError> {
        let Some(bonus) = self.policy.deposit_bonus() else { return Ok(()) };
        let Some(account) = self.db.fetch_account(&update.account_id).await? else { return Ok(()) };
        let Some(referrer) = account.referred_by else { return Ok(()) };
        let reference = format!("deposit-bonus:{}", update.charge_id);
        let op = LedgerOperation::commission(referrer.clone(), &reference, bonus);
        let outcome = self.db.apply_operation(op).await?;
        if outcome.applied {
            info!("🔄️ Paid {bonus} deposit bonus to {referrer} for charge {}", update.charge_id);
        }
        Ok(())
    }

    /// Debits a payout request. The balance is reduced immediately; the actual PIX transfer is an
    /// offline process working off the `Withdrawal` ledger entries. A caller-supplied reference
    /// makes retries of the same request idempotent.
    pub async fn request_withdrawal(
        &self,
        account: &AccountId,
        amount: Money,
        reference: Option<String>,
    ) -> Result<LedgerOutcome, WalletApiError> {
        if amount <= Money::default() {
            return Err(WalletApiError::NonPositiveAmount(amount));
        }
        if amount < min_withdrawal() {
            return Err(WalletApiError::BelowMinimum(min_withdrawal()));
        }
        let reference =
            reference.unwrap_or_else(|| format!("wd_{account}_{}", Utc::now().timestamp_millis()));
        let op = LedgerOperation::withdrawal(account.clone(), &reference, amount);
        let outcome = self.db.apply_operation(op).await?;
        if outcome.applied {
            info!("🔄️ Withdrawal of {amount} requested by {account} ({reference})");
        }
        Ok(outcome)
    }
}
