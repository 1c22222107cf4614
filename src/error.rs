use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::transactions::models::TransactionStatus;

/// Top-level error type for the entire engine
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    ExternalError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wallet registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Owner {0} already has a registered wallet")]
    DuplicateWallet(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No wallet registered for {0}")]
    WalletNotFound(String),
}

/// Quote-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Invalid quote request: {0}")]
    InvalidQuoteRequest(String),

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Price feed unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Quote not found: {0}")]
    NotFound(String),

    #[error("Quote expired")]
    QuoteExpired,

    #[error("Quote already used")]
    QuoteAlreadyUsed,
}

/// Transaction orchestration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Sender {0} has no registered wallet")]
    SenderWalletMissing(String),

    #[error("Recipient {0} has no registered wallet")]
    RecipientWalletMissing(String),

    #[error("Sender and recipient must differ")]
    SelfTransferNotAllowed,

    #[error("Amount {amount} outside allowed range [{min}, {max}]")]
    AmountOutOfBounds {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("No recipient has a registered wallet")]
    NoValidRecipients,

    #[error("Transaction request not found: {0}")]
    NotFound(String),

    #[error("Caller is not the owner of this request")]
    Unauthorized,

    #[error("Transaction request expired")]
    Expired,

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Errors reported by the external ledger client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger network error: {0}")]
    Network(String),

    #[error("Ledger request timed out")]
    Timeout,

    #[error("Malformed ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Network and timeout failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Network(_) | LedgerError::Timeout)
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::Wallet(WalletError::DuplicateWallet(_)) => {
                (StatusCode::CONFLICT, "DUPLICATE_WALLET", None)
            }
            AppError::Wallet(WalletError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", None)
            }
            AppError::Wallet(WalletError::WalletNotFound(_)) => {
                (StatusCode::NOT_FOUND, "WALLET_NOT_FOUND", None)
            }
            AppError::Quote(QuoteError::InvalidQuoteRequest(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_QUOTE_REQUEST", None)
            }
            AppError::Quote(QuoteError::UnsupportedAsset(asset)) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_ASSET",
                Some(serde_json::json!({ "asset": asset })),
            ),
            AppError::Quote(QuoteError::PriceUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PRICE_UNAVAILABLE", None)
            }
            AppError::Quote(QuoteError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "QUOTE_NOT_FOUND", None)
            }
            AppError::Quote(QuoteError::QuoteExpired) => {
                (StatusCode::BAD_REQUEST, "QUOTE_EXPIRED", None)
            }
            AppError::Quote(QuoteError::QuoteAlreadyUsed) => {
                (StatusCode::CONFLICT, "QUOTE_ALREADY_USED", None)
            }
            AppError::Transaction(TransactionError::SenderWalletMissing(_)) => {
                (StatusCode::BAD_REQUEST, "SENDER_WALLET_MISSING", None)
            }
            AppError::Transaction(TransactionError::RecipientWalletMissing(_)) => {
                (StatusCode::CONFLICT, "RECIPIENT_WALLET_MISSING", None)
            }
            AppError::Transaction(TransactionError::SelfTransferNotAllowed) => {
                (StatusCode::BAD_REQUEST, "SELF_TRANSFER_NOT_ALLOWED", None)
            }
            AppError::Transaction(TransactionError::AmountOutOfBounds { amount, min, max }) => (
                StatusCode::BAD_REQUEST,
                "AMOUNT_OUT_OF_BOUNDS",
                Some(serde_json::json!({
                    "amount": amount.to_string(),
                    "min": min.to_string(),
                    "max": max.to_string(),
                })),
            ),
            AppError::Transaction(TransactionError::NoValidRecipients) => {
                (StatusCode::BAD_REQUEST, "NO_VALID_RECIPIENTS", None)
            }
            AppError::Transaction(TransactionError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "REQUEST_NOT_FOUND", None)
            }
            AppError::Transaction(TransactionError::Unauthorized) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED", None)
            }
            AppError::Transaction(TransactionError::Expired) => {
                (StatusCode::GONE, "REQUEST_EXPIRED", None)
            }
            AppError::Transaction(TransactionError::InvalidTransition { from, to }) => (
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
                Some(serde_json::json!({ "from": from, "to": to })),
            ),
            AppError::Transaction(TransactionError::InvalidSignature(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", None)
            }
            AppError::Ledger(_) => (StatusCode::BAD_GATEWAY, "LEDGER_ERROR", None),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", None),
            AppError::ExternalError(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_ERROR", None),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

/// Result type alias for the engine
pub type AppResult<T> = Result<T, AppError>;
