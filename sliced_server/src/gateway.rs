//! The PIX payment gateway client.
//!
//! [`PixGateway`] is the seam the routes are generic over; [`MercadoPagoGateway`] is the
//! production implementation. Webhook handling deliberately goes through [`PixGateway::fetch_charge`]
//! rather than trusting anything in the webhook body.
use std::fmt::Debug;

use log::*;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sliced_common::{Money, Secret};
use sliced_engine::{db_types::AccountId, ChargeUpdate};
use thiserror::Error;

use crate::{
    config::GatewayConfig,
    data_objects::{NewPixCharge, PixCharge},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("The payment gateway could not be reached. {0}")]
    Unreachable(String),
    #[error("The payment gateway returned an unusable response. {0}")]
    InvalidResponse(String),
    #[error("Charge {0} does not exist at the payment gateway")]
    ChargeNotFound(String),
}

#[allow(async_fn_in_trait)]
pub trait PixGateway {
    /// Creates a PIX charge and returns its id and QR payloads.
    async fn create_charge(&self, request: NewPixCharge) -> Result<PixCharge, GatewayError>;
    /// Fetches the authoritative state of a charge. This is the only trusted source for deposit
    /// amounts and statuses.
    async fn fetch_charge(&self, charge_id: &str) -> Result<ChargeUpdate, GatewayError>;
}

#[derive(Clone)]
pub struct MercadoPagoGateway {
    client: Client,
    base_url: String,
    access_token: Secret<String>,
}

impl Debug for MercadoPagoGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MercadoPagoGateway ({})", self.base_url)
    }
}

impl MercadoPagoGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { client: Client::new(), base_url: config.base_url, access_token: config.access_token }
    }
}

/// The subset of the gateway's payment resource that the platform reads.
#[derive(Debug, Deserialize)]
struct PaymentResource {
    id: serde_json::Value,
    status: String,
    transaction_amount: f64,
    external_reference: Option<String>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

impl PaymentResource {
    fn charge_id(&self) -> Result<String, GatewayError> {
        match &self.id {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(GatewayError::InvalidResponse(format!("unusable payment id: {other}"))),
        }
    }

    fn into_update(self) -> Result<ChargeUpdate, GatewayError> {
        let charge_id = self.charge_id()?;
        let status = self
            .status
            .parse()
            .map_err(|_| GatewayError::InvalidResponse(format!("unknown charge status {}", self.status)))?;
        let account_id = self
            .external_reference
            .map(AccountId::from)
            .ok_or_else(|| GatewayError::InvalidResponse(format!("charge {charge_id} has no external reference")))?;
        // The gateway reports amounts in fractional reais.
        let amount = Money::from_centavos((self.transaction_amount * 100.0).round() as i64);
        Ok(ChargeUpdate { charge_id, account_id, status, amount })
    }
}

impl PixGateway for MercadoPagoGateway {
    async fn create_charge(&self, request: NewPixCharge) -> Result<PixCharge, GatewayError> {
        let url = format!("{}/v1/payments", self.base_url);
        let (first_name, last_name) = match request.payer_name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (request.payer_name.clone(), String::default()),
        };
        let body = json!({
            "transaction_amount": request.amount.value() as f64 / 100.0,
            "description": format!("SLICED wallet deposit for {}", request.account_id),
            "payment_method_id": "pix",
            "external_reference": request.account_id,
            "payer": {
                "email": request.payer_email,
                "first_name": first_name,
                "last_name": last_name,
                "identification": { "type": "CPF", "number": request.payer_tax_id },
            },
        });
        let idempotency_key: String =
            rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
        debug!("🔌️ Creating a {} PIX charge for {}", request.amount, request.account_id);
        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.reveal())
            .header("X-Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::InvalidResponse(format!("{status}: {text}")));
        }
        let payment: PaymentResource =
            response.json().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let charge_id = payment.charge_id()?;
        let status = payment
            .status
            .parse()
            .map_err(|_| GatewayError::InvalidResponse(format!("unknown charge status {}", payment.status)))?;
        let transaction_data = payment.point_of_interaction.and_then(|poi| poi.transaction_data);
        let (qr_code_base64, copy_paste_code) = match transaction_data {
            Some(data) => (data.qr_code_base64, data.qr_code),
            None => (None, None),
        };
        info!("🔌️ Created charge {charge_id} for {}", request.account_id);
        Ok(PixCharge { charge_id, status, qr_code_base64, copy_paste_code })
    }

    async fn fetch_charge(&self, charge_id: &str) -> Result<ChargeUpdate, GatewayError> {
        let url = format!("{}/v1/payments/{charge_id}", self.base_url);
        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.reveal())
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ChargeNotFound(charge_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::InvalidResponse(format!("{status}: {text}")));
        }
        let payment: PaymentResource =
            response.json().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        payment.into_update()
    }
}
