use serde::{Deserialize, Serialize};
use sliced_common::Money;

use crate::db_types::{AccountId, LedgerEntryKind, MatchId};

/// A single balance mutation, identified by its `(account_id, external_ref, kind)` triple.
/// Submitting the same operation twice applies it once; the second submission reports
/// `applied == false` and leaves the balance untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOperation {
    pub account_id: AccountId,
    pub external_ref: String,
    pub kind: LedgerEntryKind,
    pub delta: Money,
}

impl LedgerOperation {
    pub fn deposit(account_id: AccountId, charge_id: &str, amount: Money) -> Self {
        Self { account_id, external_ref: charge_id.to_string(), kind: LedgerEntryKind::Deposit, delta: amount }
    }

    pub fn game_charge(account_id: AccountId, match_id: &MatchId, fee: Money) -> Self {
        Self { account_id, external_ref: match_id.to_string(), kind: LedgerEntryKind::GameCharge, delta: -fee }
    }

    pub fn game_credit(account_id: AccountId, match_id: &MatchId, prize: Money) -> Self {
        Self { account_id, external_ref: match_id.to_string(), kind: LedgerEntryKind::GameCredit, delta: prize }
    }

    pub fn withdrawal(account_id: AccountId, reference: &str, amount: Money) -> Self {
        Self { account_id, external_ref: reference.to_string(), kind: LedgerEntryKind::Withdrawal, delta: -amount }
    }

    pub fn commission(account_id: AccountId, reference: &str, amount: Money) -> Self {
        Self {
            account_id,
            external_ref: reference.to_string(),
            kind: LedgerEntryKind::AffiliateCommission,
            delta: amount,
        }
    }
}

/// How a finished match's pot is distributed. Produced by the settlement engine and applied
/// atomically by [`MatchManagement::settle_match`](crate::traits::MatchManagement::settle_match).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeSplit {
    pub winner: AccountId,
    pub winner_credit: Money,
    /// Referrer payout, taken out of the platform's share.
    pub commission: Option<(AccountId, Money)>,
    pub platform_retained: Money,
}

impl PrizeSplit {
    /// Everything the split accounts for. Always equals the stake that produced it.
    pub fn total(&self) -> Money {
        let commission = self.commission.as_ref().map(|(_, amount)| *amount).unwrap_or_default();
        self.winner_credit + commission + self.platform_retained
    }
}
