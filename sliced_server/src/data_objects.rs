use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sliced_common::Money;
use sliced_engine::{
    db_types::{AccountId, ChargeStatus, LedgerEntry, MatchId},
    events::PaymentStatusEvent,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/deposit/create`, passed on to the gateway as-is. The amount is what the
/// player will be asked to pay; the payer details are required by PIX.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPixCharge {
    pub account_id: AccountId,
    pub amount: Money,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_tax_id: String,
}

/// A charge as created at the gateway. The QR fields are handed straight to the client for
/// rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixCharge {
    pub charge_id: String,
    pub status: ChargeStatus,
    pub qr_code_base64: Option<String>,
    pub copy_paste_code: Option<String>,
}

/// The gateway's webhook body. Only the charge id is taken from it; everything else about the
/// charge is re-fetched from the gateway before any money moves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentWebhook {
    #[serde(rename = "type")]
    pub topic: Option<String>,
    pub action: Option<String>,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    pub id: Option<serde_json::Value>,
}

impl PaymentWebhook {
    /// The gateway serialises the charge id as a string in some webhook versions and as a number
    /// in others.
    pub fn charge_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Older webhook formats carry the charge id and topic as query parameters instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    pub id: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccountRequest {
    pub account_id: AccountId,
    pub display_name: String,
    #[serde(default)]
    pub referred_by: Option<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub account_id: AccountId,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub account_id: AccountId,
    pub amount: Money,
    pub pix_key: String,
    pub pix_key_type: String,
    /// Lets a client retry the same request without being debited twice.
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameChargeRequest {
    pub account_id: AccountId,
    pub match_id: MatchId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCreditRequest {
    pub account_id: AccountId,
    pub match_id: MatchId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub settled: bool,
}

/// Messages a websocket client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsRequest {
    Register { charge_id: String },
}

/// Messages the server pushes over a registered websocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsPush {
    PaymentStatus { charge_id: String, status: ChargeStatus, amount: Money },
}

impl WsPush {
    pub fn payment_status(event: &PaymentStatusEvent) -> Self {
        Self::PaymentStatus { charge_id: event.charge_id.clone(), status: event.status, amount: event.amount }
    }
}
