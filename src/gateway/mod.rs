//! Typed client surface for the third-party settlement (on/off-ramp) gateway.
//!
//! Every upstream status vocabulary is normalized into [`GatewayTxStatus`]
//! before it reaches an orchestrator, and every error carries a `retryable`
//! classification so callers can decide whether to back off or give up.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use http::HttpSettlementGateway;

/// Normalized tri-state for any asynchronous gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayTxStatus {
    Pending,
    Success,
    Failed,
}

impl GatewayTxStatus {
    /// Map the gateway's per-endpoint status vocabulary onto the tri-state.
    /// Unknown values are treated as still pending rather than failed so a
    /// vocabulary addition upstream cannot fail live payments.
    pub fn from_upstream(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "SUCCESS" | "SUCCESSFUL" | "COMPLETE" | "COMPLETED" | "SETTLED" | "CONFIRMED" => {
                GatewayTxStatus::Success
            }
            "FAILED" | "FAILURE" | "CANCELLED" | "CANCELED" | "REJECTED" | "EXPIRED"
            | "DECLINED" => GatewayTxStatus::Failed,
            _ => GatewayTxStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatewayTxStatus::Pending)
    }
}

/// Gateway failure with a retryability classification.
///
/// Network errors, timeouts and 5xx responses are retryable; 4xx and
/// business-rule rejections are not.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (retryable: {retryable})")]
pub struct GatewayError {
    pub message: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
}

impl GatewayError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            http_status: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            http_status: None,
        }
    }

    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: status >= 500,
            http_status: Some(status),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        // Connectivity and timeout failures are transient by definition.
        if err.is_timeout() || err.is_connect() {
            return GatewayError::retryable(format!("gateway unreachable: {}", err));
        }
        match err.status() {
            Some(status) => GatewayError::from_http_status(status.as_u16(), err.to_string()),
            None => GatewayError::retryable(err.to_string()),
        }
    }
}

/// Which direction a quote is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    Onramp,
    Offramp,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    pub kind: QuoteKind,
    pub amount_fiat: Decimal,
    pub fiat_currency: String,
    pub crypto_currency: String,
    pub network: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Quote {
    pub id: String,
    pub exchange_rate: Decimal,
    pub crypto_amount: Decimal,
    pub fees: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnrampRequest {
    /// Customer identifier on the fiat rail (mobile-money phone number).
    pub customer_identifier: String,
    pub amount_fiat: Decimal,
    pub fiat_currency: String,
    pub wallet_address: String,
    pub token_address: String,
    pub network: String,
    pub quote_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnrampReceipt {
    pub order_id: String,
    pub status: GatewayTxStatus,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TxStatusReport {
    pub status: GatewayTxStatus,
    pub amount: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositRequest {
    pub chain: String,
    pub wallet_address: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DepositReceipt {
    pub success: bool,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfframpRequest {
    pub chain: String,
    pub tx_hash: String,
    pub destination: String,
    pub token_address: String,
    pub crypto_amount: Decimal,
    pub quote_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OfframpReceipt {
    pub order_id: String,
    pub status: GatewayTxStatus,
}

/// Which rail a dispute ticket concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeKind {
    Onramp,
    Offramp,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisputeTicketRequest {
    pub kind: DisputeKind,
    pub order_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisputeTicket {
    pub ticket_id: String,
}

/// The settlement gateway contract consumed by the orchestrators.
///
/// Injected at construction time so tests can substitute a fake; the
/// production implementation is [`HttpSettlementGateway`].
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn get_quote(&self, request: QuoteRequest) -> Result<Quote, GatewayError>;

    /// Triggers the mobile-money STK push to the customer's phone.
    async fn initiate_onramp(&self, request: OnrampRequest)
        -> Result<OnrampReceipt, GatewayError>;

    async fn check_onramp_status(&self, order_id: &str) -> Result<TxStatusReport, GatewayError>;

    /// Moves the custodied funds from the onramp into the platform wallet.
    async fn process_deposit(&self, request: DepositRequest)
        -> Result<DepositReceipt, GatewayError>;

    async fn initiate_offramp(
        &self,
        request: OfframpRequest,
    ) -> Result<OfframpReceipt, GatewayError>;

    async fn check_offramp_status(&self, order_id: &str) -> Result<TxStatusReport, GatewayError>;

    /// Opens a manual-intervention ticket for a stuck or inconsistent order.
    async fn create_dispute_ticket(
        &self,
        request: DisputeTicketRequest,
    ) -> Result<DisputeTicket, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_vocabulary_normalizes_to_tri_state() {
        assert_eq!(
            GatewayTxStatus::from_upstream("COMPLETED"),
            GatewayTxStatus::Success
        );
        assert_eq!(
            GatewayTxStatus::from_upstream("settled"),
            GatewayTxStatus::Success
        );
        assert_eq!(
            GatewayTxStatus::from_upstream("REJECTED"),
            GatewayTxStatus::Failed
        );
        assert_eq!(
            GatewayTxStatus::from_upstream("PROCESSING"),
            GatewayTxStatus::Pending
        );
        // Unknown vocabulary must not fail a live payment.
        assert_eq!(
            GatewayTxStatus::from_upstream("SOME_NEW_STATE"),
            GatewayTxStatus::Pending
        );
    }

    #[test]
    fn http_status_drives_retryability() {
        assert!(GatewayError::from_http_status(503, "upstream down").retryable);
        assert!(GatewayError::from_http_status(500, "boom").retryable);
        assert!(!GatewayError::from_http_status(422, "bad quote").retryable);
        assert!(!GatewayError::from_http_status(400, "validation").retryable);
    }
}
