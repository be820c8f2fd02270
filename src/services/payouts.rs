//! Payout orchestrator: merchant withdrawal from ledger balance to mobile
//! money or bank, settled through the crypto off-ramp.
//!
//! The request path only validates, reserves funds and persists an approved
//! request plus an outbox task; the slow gateway work happens in the payout
//! worker via [`PayoutService::process_business_payout`]. Reserved funds are
//! released exactly once on failure or cancellation, enforced by conditional
//! status claims.

use crate::{
    config::AppConfig,
    entities::{
        ledger_entry::LedgerTransactionType,
        outbox_task::{self, TaskStatus, TASK_PROCESS_PAYOUT},
        payout_request::{self, PayoutMethod, PayoutStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{
        DisputeKind, DisputeTicketRequest, GatewayTxStatus, OfframpRequest, QuoteKind,
        QuoteRequest, SettlementGateway,
    },
    services::{ledger::ApplyEntryInput, ledger::LedgerService, wallets::WalletService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const PAYOUT_TASK_MAX_ATTEMPTS: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InitiatePayoutRequest {
    pub store_id: Uuid,
    #[validate(custom = "super::payments::validate_positive_decimal")]
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub payout_method: PayoutMethod,
    #[validate(length(min = 4, max = 64))]
    pub destination: String,
    pub destination_details: Option<serde_json::Value>,
}

/// Progress of a worker-driven payout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutProgress {
    /// Off-ramp confirmed and ledger debited.
    Settled,
    /// Off-ramp order still pending upstream; the task should be retried.
    InFlight,
    /// Terminal failure; reservation released.
    Failed,
    /// Another worker or a cancellation already owns this payout.
    Skipped,
}

pub struct PayoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn SettlementGateway>,
    ledger: Arc<LedgerService>,
    wallets: Arc<WalletService>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl PayoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn SettlementGateway>,
        ledger: Arc<LedgerService>,
        wallets: Arc<WalletService>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            gateway,
            ledger,
            wallets,
            event_sender,
            config,
        }
    }

    /// Validate, reserve and enqueue a payout. Fails without a persisted row
    /// when the amount exceeds the available balance or falls below the
    /// store's minimum, so a rejected request leaves no trace to clean up.
    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    pub async fn initiate_business_payout(
        &self,
        request: InitiatePayoutRequest,
    ) -> Result<payout_request::Model, ServiceError> {
        request.validate()?;

        let balance = self
            .ledger
            .get_or_create_balance(request.store_id, &request.currency)
            .await?;
        if balance.minimum_payout_amount > Decimal::ZERO
            && request.amount < balance.minimum_payout_amount
        {
            return Err(ServiceError::ValidationError(format!(
                "payout amount {} is below the store minimum of {}",
                request.amount, balance.minimum_payout_amount
            )));
        }

        // Reserve first; an insufficient balance aborts before any row exists.
        self.ledger
            .reserve(request.store_id, request.amount, &request.currency)
            .await?;

        let payout_id = Uuid::new_v4();
        let now = Utc::now();
        let payout = payout_request::ActiveModel {
            id: Set(payout_id),
            store_id: Set(request.store_id),
            amount_requested: Set(request.amount),
            amount_approved: Set(Some(request.amount)),
            currency: Set(request.currency.clone()),
            payout_method: Set(request.payout_method),
            destination: Set(request.destination.clone()),
            destination_details: Set(request.destination_details.clone()),
            crypto_amount: Set(None),
            crypto_currency: Set(Some(self.config.gateway.crypto_currency.clone())),
            exchange_rate: Set(None),
            platform_wallet_id: Set(None),
            external_quote_id: Set(None),
            external_offramp_order_id: Set(None),
            blockchain_hash: Set(None),
            status: Set(PayoutStatus::Approved),
            error_message: Set(None),
            requested_at: Set(now),
            approved_at: Set(Some(now)),
            completed_at: Set(None),
            failed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        self.enqueue_payout_task(payout_id).await?;

        self.event_sender
            .send_or_log(Event::PayoutApproved {
                payout_id,
                store_id: request.store_id,
                amount: request.amount,
            })
            .await;

        info!(%payout_id, amount = %request.amount, "payout approved and queued");
        Ok(payout)
    }

    /// Worker entry point. Drives an approved payout through off-ramp
    /// settlement, or resumes polling for one already processing. Safe to
    /// call repeatedly; the Approved -> Processing claim and the
    /// Processing -> Completed claim each succeed at most once.
    #[instrument(skip(self))]
    pub async fn process_business_payout(
        &self,
        payout_id: Uuid,
    ) -> Result<PayoutProgress, ServiceError> {
        let payout = self.get_payout(payout_id).await?;

        match payout.status {
            PayoutStatus::Approved => self.start_offramp(payout).await,
            PayoutStatus::Processing => self.poll_offramp(payout).await,
            // Cancelled, completed or failed while queued.
            _ => Ok(PayoutProgress::Skipped),
        }
    }

    async fn start_offramp(
        &self,
        payout: payout_request::Model,
    ) -> Result<PayoutProgress, ServiceError> {
        let amount = payout.amount_approved.unwrap_or(payout.amount_requested);

        let claimed = self
            .advance(
                payout.id,
                &[PayoutStatus::Approved],
                payout_request::ActiveModel {
                    status: Set(PayoutStatus::Processing),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            return Ok(PayoutProgress::Skipped);
        }

        let quote = match self
            .gateway
            .get_quote(QuoteRequest {
                kind: QuoteKind::Offramp,
                amount_fiat: amount,
                fiat_currency: payout.currency.clone(),
                crypto_currency: self.config.gateway.crypto_currency.clone(),
                network: self.config.gateway.network.clone(),
            })
            .await
        {
            Ok(quote) => quote,
            Err(e) if e.retryable => return Err(ServiceError::Gateway(e)),
            Err(e) => {
                self.fail_payout(&payout, &format!("offramp quote failed: {}", e.message))
                    .await?;
                return Ok(PayoutProgress::Failed);
            }
        };

        let wallet = match self
            .wallets
            .allocate(
                &self.config.gateway.network,
                &self.config.gateway.crypto_currency,
                amount,
            )
            .await
        {
            Ok(wallet) => wallet,
            Err(e) => {
                self.fail_payout(&payout, &format!("wallet allocation failed: {}", e))
                    .await?;
                return Ok(PayoutProgress::Failed);
            }
        };

        // The on-chain withdrawal from the custodial wallet is executed by
        // the custody provider; we derive the reference hash it reports.
        let withdrawal_hash = withdrawal_reference(payout.id, &wallet.address);

        let receipt = match self
            .gateway
            .initiate_offramp(OfframpRequest {
                chain: self.config.gateway.network.clone(),
                tx_hash: withdrawal_hash.clone(),
                destination: payout.destination.clone(),
                token_address: self.config.gateway.token_address.clone(),
                crypto_amount: quote.crypto_amount,
                quote_id: quote.id.clone(),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) if e.retryable => return Err(ServiceError::Gateway(e)),
            Err(e) => {
                // Crypto may already have left the wallet; open a ticket.
                self.fail_payout_with_dispute(&payout, None, &format!(
                    "offramp initiation failed: {}",
                    e.message
                ))
                .await?;
                return Ok(PayoutProgress::Failed);
            }
        };

        self.advance(
            payout.id,
            &[PayoutStatus::Processing],
            payout_request::ActiveModel {
                crypto_amount: Set(Some(quote.crypto_amount)),
                exchange_rate: Set(Some(quote.exchange_rate)),
                platform_wallet_id: Set(Some(wallet.id)),
                external_quote_id: Set(Some(quote.id)),
                external_offramp_order_id: Set(Some(receipt.order_id.clone())),
                blockchain_hash: Set(Some(withdrawal_hash)),
                ..Default::default()
            },
        )
        .await?;

        match receipt.status {
            GatewayTxStatus::Failed => {
                self.fail_payout_with_dispute(
                    &payout,
                    Some(&receipt.order_id),
                    "offramp order rejected by gateway",
                )
                .await?;
                Ok(PayoutProgress::Failed)
            }
            GatewayTxStatus::Success => self.settle(&payout, amount).await,
            GatewayTxStatus::Pending => Ok(PayoutProgress::InFlight),
        }
    }

    async fn poll_offramp(
        &self,
        payout: payout_request::Model,
    ) -> Result<PayoutProgress, ServiceError> {
        let order_id = match &payout.external_offramp_order_id {
            Some(id) => id.clone(),
            // Interrupted between the Processing claim and recording the
            // offramp order. The initiation call may still have landed
            // upstream, so this needs a human look before the money is
            // considered safe.
            None => {
                self.fail_payout_with_dispute(
                    &payout,
                    None,
                    "payout interrupted before the offramp order was recorded; reconcile upstream",
                )
                .await?;
                return Ok(PayoutProgress::Failed);
            }
        };

        let report = match self.gateway.check_offramp_status(&order_id).await {
            Ok(report) => report,
            Err(e) if e.retryable => return Err(ServiceError::Gateway(e)),
            Err(e) => {
                self.fail_payout_with_dispute(
                    &payout,
                    Some(&order_id),
                    &format!("offramp status check failed: {}", e.message),
                )
                .await?;
                return Ok(PayoutProgress::Failed);
            }
        };

        match report.status {
            GatewayTxStatus::Success => {
                let amount = payout.amount_approved.unwrap_or(payout.amount_requested);
                self.settle(&payout, amount).await
            }
            GatewayTxStatus::Failed => {
                let reason = report
                    .message
                    .unwrap_or_else(|| "offramp order failed".to_string());
                self.fail_payout_with_dispute(&payout, Some(&order_id), &reason)
                    .await?;
                Ok(PayoutProgress::Failed)
            }
            GatewayTxStatus::Pending => Ok(PayoutProgress::InFlight),
        }
    }

    /// Finalize: claim Processing -> Completed, then debit the reserved
    /// bucket. The claim makes the debit exactly-once under concurrent
    /// workers.
    async fn settle(
        &self,
        payout: &payout_request::Model,
        amount: Decimal,
    ) -> Result<PayoutProgress, ServiceError> {
        let claimed = self
            .advance(
                payout.id,
                &[PayoutStatus::Processing],
                payout_request::ActiveModel {
                    status: Set(PayoutStatus::Completed),
                    completed_at: Set(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            return Ok(PayoutProgress::Skipped);
        }

        self.ledger
            .apply_entry(ApplyEntryInput {
                store_id: payout.store_id,
                amount: -amount,
                transaction_type: LedgerTransactionType::Payout,
                transaction_reference: payout.id.to_string(),
                description: format!(
                    "Payout of {} {} to {}",
                    amount, payout.currency, payout.destination
                ),
                currency: payout.currency.clone(),
                payment_id: None,
                payout_id: Some(payout.id),
            })
            .await?;

        self.event_sender
            .send_or_log(Event::PayoutCompleted {
                payout_id: payout.id,
                store_id: payout.store_id,
                amount,
            })
            .await;

        info!(payout_id = %payout.id, %amount, "payout settled");
        Ok(PayoutProgress::Settled)
    }

    /// Cancel a payout that has not started processing, returning the
    /// reservation. Requests already in flight must run to a terminal state.
    #[instrument(skip(self))]
    pub async fn cancel_payout(
        &self,
        payout_id: Uuid,
    ) -> Result<payout_request::Model, ServiceError> {
        let payout = self.get_payout(payout_id).await?;

        let claimed = self
            .advance(
                payout_id,
                &[PayoutStatus::Pending, PayoutStatus::Approved],
                payout_request::ActiveModel {
                    status: Set(PayoutStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            return Err(ServiceError::InvalidStatus(format!(
                "payout {} is {:?} and can no longer be cancelled",
                payout_id, payout.status
            )));
        }

        let amount = payout.amount_approved.unwrap_or(payout.amount_requested);
        self.ledger.release(payout.store_id, amount).await?;

        self.event_sender
            .send_or_log(Event::PayoutCancelled {
                payout_id,
                store_id: payout.store_id,
            })
            .await;

        info!(%payout_id, "payout cancelled and reservation released");
        self.get_payout(payout_id).await
    }

    pub async fn get_payout(
        &self,
        payout_id: Uuid,
    ) -> Result<payout_request::Model, ServiceError> {
        payout_request::Entity::find_by_id(payout_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payout {} not found", payout_id)))
    }

    /// Terminal failure: claim Failed, release the reservation once.
    async fn fail_payout(
        &self,
        payout: &payout_request::Model,
        reason: &str,
    ) -> Result<(), ServiceError> {
        let claimed = self
            .advance(
                payout.id,
                &[
                    PayoutStatus::Pending,
                    PayoutStatus::Approved,
                    PayoutStatus::Processing,
                ],
                payout_request::ActiveModel {
                    status: Set(PayoutStatus::Failed),
                    failed_at: Set(Some(Utc::now())),
                    error_message: Set(Some(reason.to_string())),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            return Ok(());
        }

        error!(payout_id = %payout.id, reason, "payout failed");
        let amount = payout.amount_approved.unwrap_or(payout.amount_requested);
        self.ledger.release(payout.store_id, amount).await?;

        self.event_sender
            .send_or_log(Event::PayoutFailed {
                payout_id: payout.id,
                store_id: payout.store_id,
                reason: reason.to_string(),
            })
            .await;
        Ok(())
    }

    async fn fail_payout_with_dispute(
        &self,
        payout: &payout_request::Model,
        order_id: Option<&str>,
        reason: &str,
    ) -> Result<(), ServiceError> {
        self.fail_payout(payout, reason).await?;
        if let Err(e) = self
            .gateway
            .create_dispute_ticket(DisputeTicketRequest {
                kind: DisputeKind::Offramp,
                order_id: order_id.unwrap_or_default().to_string(),
                description: format!("payout {}: {}", payout.id, reason),
            })
            .await
        {
            warn!(payout_id = %payout.id, error = %e, "failed to open dispute ticket");
        }
        Ok(())
    }

    async fn advance(
        &self,
        payout_id: Uuid,
        from: &[PayoutStatus],
        mut patch: payout_request::ActiveModel,
    ) -> Result<bool, ServiceError> {
        patch.updated_at = Set(Some(Utc::now()));
        let result = payout_request::Entity::update_many()
            .set(patch)
            .filter(payout_request::Column::Id.eq(payout_id))
            .filter(payout_request::Column::Status.is_in(from.to_vec()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn enqueue_payout_task(&self, payout_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        outbox_task::ActiveModel {
            id: Set(Uuid::new_v4()),
            task_type: Set(TASK_PROCESS_PAYOUT.to_string()),
            payload: Set(serde_json::json!({ "payout_id": payout_id })),
            status: Set(TaskStatus::Pending),
            attempts: Set(0),
            max_attempts: Set(PAYOUT_TASK_MAX_ATTEMPTS),
            last_error: Set(None),
            available_at: Set(now),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;
        Ok(())
    }
}

/// Deterministic reference for the custodial withdrawal backing a payout.
fn withdrawal_reference(payout_id: Uuid, wallet_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payout_id.as_bytes());
    hasher.update(wallet_address.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_reference_is_stable_per_payout() {
        let id = Uuid::new_v4();
        let a = withdrawal_reference(id, "0xwallet");
        let b = withdrawal_reference(id, "0xwallet");
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);

        let other = withdrawal_reference(Uuid::new_v4(), "0xwallet");
        assert_ne!(a, other);
    }
}
