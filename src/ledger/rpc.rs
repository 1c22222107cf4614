use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::client::{Confirmation, LedgerClient, ReferenceInfo};
use crate::config::LedgerConfig;
use crate::error::LedgerError;

/// JSON-RPC ledger client (`getLatestBlockhash`, `getSignatureStatuses`)
pub struct RpcLedgerClient {
    http_client: Client,
    rpc_url: String,
}

impl RpcLedgerClient {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rpc_url: config.rpc_url.clone(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_server_error() {
            return Err(LedgerError::Network(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(LedgerError::Network(format!("RPC error: {}", error)));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("Missing result in {}", method)))
    }
}

fn map_transport_error(error: reqwest::Error) -> LedgerError {
    if error.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Network(error.to_string())
    }
}

/// Interpret one entry of a `getSignatureStatuses` result
pub(crate) fn parse_signature_status(signature: &str, status: &Value) -> Confirmation {
    if status.is_null() {
        return Confirmation::Pending;
    }

    match status.get("err") {
        Some(err) if !err.is_null() => {
            return Confirmation::Rejected {
                reason: err.to_string(),
            }
        }
        _ => {}
    }

    match status.get("confirmationStatus").and_then(Value::as_str) {
        Some("confirmed") | Some("finalized") => Confirmation::Confirmed {
            ledger_ref: signature.to_string(),
        },
        _ => Confirmation::Pending,
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_reference_info(&self) -> Result<ReferenceInfo, LedgerError> {
        let result = self
            .call("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
            .await?;

        let value = result
            .get("value")
            .ok_or_else(|| LedgerError::InvalidResponse("Missing value".to_string()))?;

        let reference = value
            .get("blockhash")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::InvalidResponse("Missing blockhash".to_string()))?
            .to_string();

        Ok(ReferenceInfo {
            reference,
            last_valid_height: value.get("lastValidBlockHeight").and_then(Value::as_u64),
        })
    }

    async fn confirm(&self, signature: &str) -> Result<Confirmation, LedgerError> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        let status = result
            .get("value")
            .and_then(|v| v.get(0))
            .cloned()
            .unwrap_or(Value::Null);

        let confirmation = parse_signature_status(signature, &status);
        debug!(signature = %signature, ?confirmation, "Signature status");
        Ok(confirmation)
    }
}
