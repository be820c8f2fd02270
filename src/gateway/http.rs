//! HTTPS implementation of the settlement gateway client.
//!
//! Each call is written to the `gateway_request_logs` audit table (request,
//! response, HTTP status, success flag, correlation id) before its result is
//! returned, so any settlement decision can be replayed from the log.

use super::{
    DepositReceipt, DepositRequest, DisputeKind, DisputeTicket, DisputeTicketRequest,
    GatewayError, GatewayTxStatus, OfframpReceipt, OfframpRequest, OnrampReceipt, OnrampRequest,
    Quote, QuoteKind, QuoteRequest, SettlementGateway, TxStatusReport,
};
use crate::{config::GatewayConfig, entities::gateway_log};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct HttpSettlementGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    db: Arc<DatabaseConnection>,
}

impl HttpSettlementGateway {
    pub fn new(config: &GatewayConfig, db: Arc<DatabaseConnection>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::permanent(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            db,
        })
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        request: &Req,
    ) -> Result<Resp, GatewayError> {
        let correlation_id = Uuid::new_v4();
        let request_json = serde_json::to_value(request).unwrap_or_default();
        debug!(operation, %correlation_id, "gateway request");

        let result = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("x-api-secret", &self.api_secret)
            .json(request)
            .send()
            .await;

        self.finish(operation, correlation_id, request_json, result)
            .await
    }

    async fn get<Resp: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<Resp, GatewayError> {
        let correlation_id = Uuid::new_v4();
        debug!(operation, %correlation_id, "gateway request");

        let result = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("x-api-secret", &self.api_secret)
            .send()
            .await;

        self.finish(operation, correlation_id, serde_json::Value::Null, result)
            .await
    }

    /// Normalize the HTTP outcome, logging the exchange before returning it.
    async fn finish<Resp: DeserializeOwned>(
        &self,
        operation: &str,
        correlation_id: Uuid,
        request_json: serde_json::Value,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Resp, GatewayError> {
        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let body: serde_json::Value = response
                    .json()
                    .await
                    .unwrap_or(serde_json::Value::Null);
                let success = (200..300).contains(&status);

                self.log_call(operation, correlation_id, &request_json, &body, status, success)
                    .await;

                if !success {
                    let message = body
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("gateway request rejected")
                        .to_string();
                    return Err(GatewayError::from_http_status(status, message));
                }

                serde_json::from_value(body).map_err(|e| {
                    GatewayError::permanent(format!("unexpected gateway response shape: {}", e))
                })
            }
            Err(err) => {
                self.log_call(
                    operation,
                    correlation_id,
                    &request_json,
                    &serde_json::json!({ "transport_error": err.to_string() }),
                    0,
                    false,
                )
                .await;
                Err(GatewayError::from(err))
            }
        }
    }

    async fn log_call(
        &self,
        operation: &str,
        correlation_id: Uuid,
        request: &serde_json::Value,
        response: &serde_json::Value,
        http_status: u16,
        success: bool,
    ) {
        let entry = gateway_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            operation: Set(operation.to_string()),
            correlation_id: Set(correlation_id),
            request: Set(request.clone()),
            response: Set(response.clone()),
            http_status: Set(http_status as i32),
            success: Set(success),
            created_at: Set(Utc::now()),
        };
        // Audit logging must never turn a successful settlement call into a failure.
        if let Err(e) = entry.insert(&*self.db).await {
            warn!(operation, %correlation_id, error = %e, "failed to persist gateway log");
        }
    }
}

// Upstream wire shapes. The gateway's field names and status vocabularies
// vary per endpoint; they are confined to this module.

#[derive(Serialize)]
struct UpstreamQuoteRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    amount: Decimal,
    #[serde(rename = "fiatCurrency")]
    fiat_currency: &'a str,
    #[serde(rename = "cryptoCurrency")]
    crypto_currency: &'a str,
    network: &'a str,
}

#[derive(Deserialize)]
struct UpstreamQuote {
    #[serde(alias = "quoteId")]
    id: String,
    #[serde(rename = "exchangeRate")]
    exchange_rate: Decimal,
    #[serde(rename = "cryptoAmount")]
    crypto_amount: Decimal,
    #[serde(default)]
    fees: Decimal,
    #[serde(rename = "expiresAt", default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct UpstreamOnrampRequest<'a> {
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
    amount: Decimal,
    currency: &'a str,
    #[serde(rename = "walletAddress")]
    wallet_address: &'a str,
    #[serde(rename = "tokenAddress")]
    token_address: &'a str,
    network: &'a str,
    #[serde(rename = "quoteId")]
    quote_id: &'a str,
}

#[derive(Deserialize)]
struct UpstreamOrderReceipt {
    #[serde(rename = "orderId", alias = "orderID", alias = "id")]
    order_id: String,
    status: String,
    #[serde(rename = "txHash", default)]
    tx_hash: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamStatusReport {
    status: String,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(rename = "txHash", alias = "hash", default)]
    tx_hash: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct UpstreamDepositRequest<'a> {
    chain: &'a str,
    #[serde(rename = "walletAddress")]
    wallet_address: &'a str,
    #[serde(rename = "orderId")]
    order_id: &'a str,
}

#[derive(Deserialize)]
struct UpstreamDepositReceipt {
    success: bool,
    #[serde(rename = "txHash", alias = "hash", default)]
    tx_hash: Option<String>,
}

#[derive(Serialize)]
struct UpstreamOfframpRequest<'a> {
    chain: &'a str,
    #[serde(rename = "txHash")]
    tx_hash: &'a str,
    destination: &'a str,
    #[serde(rename = "tokenAddress")]
    token_address: &'a str,
    amount: Decimal,
    #[serde(rename = "quoteId")]
    quote_id: &'a str,
}

#[derive(Serialize)]
struct UpstreamTicketRequest<'a> {
    #[serde(rename = "orderId")]
    order_id: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct UpstreamTicket {
    #[serde(rename = "ticketId", alias = "id")]
    ticket_id: String,
}

#[async_trait]
impl SettlementGateway for HttpSettlementGateway {
    async fn get_quote(&self, request: QuoteRequest) -> Result<Quote, GatewayError> {
        let kind = match request.kind {
            QuoteKind::Onramp => "onramp",
            QuoteKind::Offramp => "offramp",
        };
        let upstream: UpstreamQuote = self
            .post(
                "get_quote",
                "/quotes",
                &UpstreamQuoteRequest {
                    kind,
                    amount: request.amount_fiat,
                    fiat_currency: &request.fiat_currency,
                    crypto_currency: &request.crypto_currency,
                    network: &request.network,
                },
            )
            .await?;
        Ok(Quote {
            id: upstream.id,
            exchange_rate: upstream.exchange_rate,
            crypto_amount: upstream.crypto_amount,
            fees: upstream.fees,
            expires_at: upstream.expires_at,
        })
    }

    async fn initiate_onramp(
        &self,
        request: OnrampRequest,
    ) -> Result<OnrampReceipt, GatewayError> {
        let upstream: UpstreamOrderReceipt = self
            .post(
                "initiate_onramp",
                "/onramp",
                &UpstreamOnrampRequest {
                    phone_number: &request.customer_identifier,
                    amount: request.amount_fiat,
                    currency: &request.fiat_currency,
                    wallet_address: &request.wallet_address,
                    token_address: &request.token_address,
                    network: &request.network,
                    quote_id: &request.quote_id,
                },
            )
            .await?;
        Ok(OnrampReceipt {
            order_id: upstream.order_id,
            status: GatewayTxStatus::from_upstream(&upstream.status),
            tx_hash: upstream.tx_hash,
        })
    }

    async fn check_onramp_status(&self, order_id: &str) -> Result<TxStatusReport, GatewayError> {
        let upstream: UpstreamStatusReport = self
            .get(
                "check_onramp_status",
                &format!("/onramp-status/{}", order_id),
            )
            .await?;
        Ok(TxStatusReport {
            status: GatewayTxStatus::from_upstream(&upstream.status),
            amount: upstream.amount,
            tx_hash: upstream.tx_hash,
            message: upstream.message,
        })
    }

    async fn process_deposit(
        &self,
        request: DepositRequest,
    ) -> Result<DepositReceipt, GatewayError> {
        let upstream: UpstreamDepositReceipt = self
            .post(
                "process_deposit",
                "/deposit",
                &UpstreamDepositRequest {
                    chain: &request.chain,
                    wallet_address: &request.wallet_address,
                    order_id: &request.order_id,
                },
            )
            .await?;
        Ok(DepositReceipt {
            success: upstream.success,
            tx_hash: upstream.tx_hash,
        })
    }

    async fn initiate_offramp(
        &self,
        request: OfframpRequest,
    ) -> Result<OfframpReceipt, GatewayError> {
        let upstream: UpstreamOrderReceipt = self
            .post(
                "initiate_offramp",
                "/offramp",
                &UpstreamOfframpRequest {
                    chain: &request.chain,
                    tx_hash: &request.tx_hash,
                    destination: &request.destination,
                    token_address: &request.token_address,
                    amount: request.crypto_amount,
                    quote_id: &request.quote_id,
                },
            )
            .await?;
        Ok(OfframpReceipt {
            order_id: upstream.order_id,
            status: GatewayTxStatus::from_upstream(&upstream.status),
        })
    }

    async fn check_offramp_status(&self, order_id: &str) -> Result<TxStatusReport, GatewayError> {
        let upstream: UpstreamStatusReport = self
            .get(
                "check_offramp_status",
                &format!("/offramp-status/{}", order_id),
            )
            .await?;
        Ok(TxStatusReport {
            status: GatewayTxStatus::from_upstream(&upstream.status),
            amount: upstream.amount,
            tx_hash: upstream.tx_hash,
            message: upstream.message,
        })
    }

    async fn create_dispute_ticket(
        &self,
        request: DisputeTicketRequest,
    ) -> Result<DisputeTicket, GatewayError> {
        let path = match request.kind {
            DisputeKind::Onramp => "/onramp-ticket",
            DisputeKind::Offramp => "/offramp-ticket",
        };
        let upstream: UpstreamTicket = self
            .post(
                "create_dispute_ticket",
                path,
                &UpstreamTicketRequest {
                    order_id: &request.order_id,
                    description: &request.description,
                },
            )
            .await?;
        Ok(DisputeTicket {
            ticket_id: upstream.ticket_id,
        })
    }
}
