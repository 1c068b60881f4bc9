use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use sliced_engine::{
    game::GameError,
    traits::{LedgerError, MatchError},
    WalletApiError,
};
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Wallet(#[from] WalletApiError),
    #[error(transparent)]
    Game(#[from] MatchError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway(e) => match e {
                GatewayError::ChargeNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Wallet(e) => match e {
                WalletApiError::BelowMinimum(_) => StatusCode::BAD_REQUEST,
                WalletApiError::NonPositiveAmount(_) => StatusCode::BAD_REQUEST,
                WalletApiError::Ledger(e) => ledger_status_code(e),
            },
            Self::Game(e) => match e {
                MatchError::NotFound(_) => StatusCode::NOT_FOUND,
                MatchError::Rules(e) => match e {
                    GameError::NotAParticipant(_) => StatusCode::FORBIDDEN,
                    GameError::InvalidCell(_) => StatusCode::BAD_REQUEST,
                    // The remaining rule violations are all stale views of a match that moved on.
                    _ => StatusCode::CONFLICT,
                },
                MatchError::Ledger(e) => ledger_status_code(e),
                MatchError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn ledger_status_code(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AccountDisabled(_) => StatusCode::FORBIDDEN,
        LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        // 5xx tells the gateway to redeliver the webhook once the database recovers.
        LedgerError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
