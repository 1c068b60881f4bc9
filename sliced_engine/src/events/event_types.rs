use serde::{Deserialize, Serialize};
use sliced_common::Money;

use crate::{
    db_types::{AccountId, ChargeStatus, MatchId, WinReason},
    traits::PrizeSplit,
};

/// Fired whenever the gateway reports a charge status, whether or not the deposit was applied.
/// `applied == false` on an approved charge means the webhook was a redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusEvent {
    pub charge_id: String,
    pub account_id: AccountId,
    pub status: ChargeStatus,
    pub amount: Money,
    pub applied: bool,
}

impl PaymentStatusEvent {
    pub fn new(charge_id: String, account_id: AccountId, status: ChargeStatus, amount: Money, applied: bool) -> Self {
        Self { charge_id, account_id, status, amount, applied }
    }
}

/// Fired once per match, after the settlement transaction has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettledEvent {
    pub match_id: MatchId,
    pub split: PrizeSplit,
    pub win_reason: WinReason,
}

impl MatchSettledEvent {
    pub fn new(match_id: MatchId, split: PrizeSplit, win_reason: WinReason) -> Self {
        Self { match_id, split, win_reason }
    }
}
