//! Payment orchestrator: drives a customer payment from STK push through
//! crypto settlement into the merchant ledger.
//!
//! Every state transition is committed before the next external call, so a
//! crash leaves a resumable row. Transitions are claimed with conditional
//! updates ("advance only if the status is still X"); losing such a claim
//! means another poller already advanced the payment and is treated as a
//! no-op, never an error. The ledger credit happens exactly once because
//! only the winner of the `stk_success -> crypto_processing` claim runs the
//! deposit phase.

use crate::{
    config::AppConfig,
    entities::{
        ledger_entry::LedgerTransactionType,
        payment_transaction::{self, PaymentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{
        DepositRequest, DisputeKind, DisputeTicketRequest, GatewayTxStatus, OnrampRequest,
        QuoteKind, QuoteRequest, SettlementGateway,
    },
    services::{ledger::ApplyEntryInput, ledger::LedgerService, wallets::WalletService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than 0".into());
        Err(err)
    }
}

/// Request to initiate a customer payment (checkout or conversational).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InitiatePaymentRequest {
    pub store_id: Uuid,
    pub order_id: Option<Uuid>,
    #[validate(custom = "validate_positive_decimal")]
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(min = 9, max = 15))]
    pub customer_phone: String,
    #[validate(email)]
    pub customer_email: Option<String>,
}

/// Outcome of a payment initiation. `success = false` means the transaction
/// row exists in `failed` state and the customer saw no STK push.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInitiation {
    pub success: bool,
    pub payment_id: Uuid,
    pub external_order_id: Option<String>,
    pub push_initiated: bool,
    pub message: String,
}

/// Snapshot returned by the polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusReport {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub amount_fiat: Decimal,
    pub currency: String,
    pub external_order_id: Option<String>,
    pub blockchain_hash: Option<String>,
    pub error_message: Option<String>,
}

pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn SettlementGateway>,
    ledger: Arc<LedgerService>,
    wallets: Arc<WalletService>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl PaymentService {
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

    /// Start a customer payment: allocate a settlement wallet, request a
    /// quote, trigger the mobile-money push. The row is persisted before the
    /// first gateway call and updated after each step; gateway failures mark
    /// it failed and surface as a structured (non-Err) result. No ledger
    /// mutation happens on this path.
    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    pub async fn initiate_customer_payment(
        &self,
        request: InitiatePaymentRequest,
    ) -> Result<PaymentInitiation, ServiceError> {
        request.validate()?;

        let wallet = self
            .wallets
            .allocate(
                &self.config.gateway.network,
                &self.config.gateway.crypto_currency,
                request.amount,
            )
            .await?;

        let payment_id = Uuid::new_v4();
        let now = Utc::now();
        payment_transaction::ActiveModel {
            id: Set(payment_id),
            store_id: Set(request.store_id),
            order_id: Set(request.order_id),
            customer_phone: Set(request.customer_phone.clone()),
            customer_email: Set(request.customer_email.clone()),
            amount_fiat: Set(request.amount),
            fiat_currency: Set(request.currency.clone()),
            amount_crypto: Set(None),
            crypto_currency: Set(self.config.gateway.crypto_currency.clone()),
            exchange_rate: Set(None),
            platform_wallet_id: Set(Some(wallet.id)),
            external_quote_id: Set(None),
            external_onramp_order_id: Set(None),
            external_deposit_order_id: Set(None),
            blockchain_hash: Set(None),
            status: Set(PaymentStatus::Pending),
            initiated_at: Set(now),
            completed_at: Set(None),
            failed_at: Set(None),
            error_message: Set(None),
            retry_count: Set(0),
            max_retries: Set(self.config.payment_max_retries),
            metadata: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(%payment_id, amount = %request.amount, "payment transaction created");

        let quote = match self
            .gateway
            .get_quote(QuoteRequest {
                kind: QuoteKind::Onramp,
                amount_fiat: request.amount,
                fiat_currency: request.currency.clone(),
                crypto_currency: self.config.gateway.crypto_currency.clone(),
                network: self.config.gateway.network.clone(),
            })
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                self.fail_payment(payment_id, request.store_id, &format!("quote failed: {}", e.message))
                    .await?;
                return Ok(self.initiation_failure(payment_id));
            }
        };

        self.advance(
            payment_id,
            &[PaymentStatus::Pending],
            payment_transaction::ActiveModel {
                status: Set(PaymentStatus::QuoteRequested),
                external_quote_id: Set(Some(quote.id.clone())),
                exchange_rate: Set(Some(quote.exchange_rate)),
                amount_crypto: Set(Some(quote.crypto_amount)),
                ..Default::default()
            },
        )
        .await?;

        let receipt = match self
            .gateway
            .initiate_onramp(OnrampRequest {
                customer_identifier: request.customer_phone.clone(),
                amount_fiat: request.amount,
                fiat_currency: request.currency.clone(),
                wallet_address: wallet.address.clone(),
                token_address: self.config.gateway.token_address.clone(),
                network: self.config.gateway.network.clone(),
                quote_id: quote.id.clone(),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                self.fail_payment(
                    payment_id,
                    request.store_id,
                    &format!("onramp initiation failed: {}", e.message),
                )
                .await?;
                return Ok(self.initiation_failure(payment_id));
            }
        };

        if receipt.status == GatewayTxStatus::Failed {
            self.fail_payment(payment_id, request.store_id, "onramp rejected by gateway")
                .await?;
            return Ok(self.initiation_failure(payment_id));
        }

        self.advance(
            payment_id,
            &[PaymentStatus::QuoteRequested],
            payment_transaction::ActiveModel {
                status: Set(PaymentStatus::StkInitiated),
                external_onramp_order_id: Set(Some(receipt.order_id.clone())),
                ..Default::default()
            },
        )
        .await?;

        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                payment_id,
                store_id: request.store_id,
                amount: request.amount,
                currency: request.currency.clone(),
            })
            .await;

        info!(%payment_id, external_order_id = %receipt.order_id, "STK push initiated");
        Ok(PaymentInitiation {
            success: true,
            payment_id,
            external_order_id: Some(receipt.order_id),
            push_initiated: true,
            message: "Payment push sent to customer".to_string(),
        })
    }

    /// Idempotent polling entry point. Safe to call repeatedly and
    /// concurrently for the same payment: terminal rows return the cached
    /// result, rows already in crypto_processing are not re-triggered, and
    /// the deposit phase runs at most once per payment id.
    #[instrument(skip(self))]
    pub async fn check_payment_status(
        &self,
        payment_id: Uuid,
    ) -> Result<PaymentStatusReport, ServiceError> {
        let payment = self.get_payment(payment_id).await?;

        match payment.status {
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded => {
                Ok(report_of(&payment))
            }
            // Another poller owns the deposit phase; do not re-trigger it.
            PaymentStatus::CryptoProcessing => Ok(report_of(&payment)),
            PaymentStatus::Pending | PaymentStatus::QuoteRequested => Ok(report_of(&payment)),
            PaymentStatus::StkInitiated | PaymentStatus::StkSuccess => {
                self.poll_onramp(payment).await
            }
        }
    }

    async fn poll_onramp(
        &self,
        payment: payment_transaction::Model,
    ) -> Result<PaymentStatusReport, ServiceError> {
        let order_id = payment.external_onramp_order_id.clone().ok_or_else(|| {
            ServiceError::InvalidStatus(format!(
                "payment {} has no onramp order id in status {:?}",
                payment.id, payment.status
            ))
        })?;

        let upstream = match self.gateway.check_onramp_status(&order_id).await {
            Ok(report) => report,
            Err(e) if e.retryable => {
                warn!(payment_id = %payment.id, error = %e, "onramp status poll failed; will retry");
                return self.note_pending_attempt(payment).await;
            }
            Err(e) => {
                self.fail_payment(payment.id, payment.store_id, &format!("status check failed: {}", e.message))
                    .await?;
                return Ok(report_of(&self.get_payment(payment.id).await?));
            }
        };

        match upstream.status {
            GatewayTxStatus::Failed => {
                let reason = upstream
                    .message
                    .unwrap_or_else(|| "mobile money payment failed".to_string());
                self.fail_payment(payment.id, payment.store_id, &reason).await?;
                Ok(report_of(&self.get_payment(payment.id).await?))
            }
            GatewayTxStatus::Pending => self.note_pending_attempt(payment).await,
            GatewayTxStatus::Success => {
                // Record customer-side success; harmless if a concurrent
                // poller already did.
                self.advance(
                    payment.id,
                    &[PaymentStatus::StkInitiated],
                    payment_transaction::ActiveModel {
                        status: Set(PaymentStatus::StkSuccess),
                        ..Default::default()
                    },
                )
                .await?;

                // Claim the deposit phase. Exactly one caller wins.
                let claimed = self
                    .advance(
                        payment.id,
                        &[PaymentStatus::StkSuccess],
                        payment_transaction::ActiveModel {
                            status: Set(PaymentStatus::CryptoProcessing),
                            ..Default::default()
                        },
                    )
                    .await?;

                if claimed {
                    let fresh = self.get_payment(payment.id).await?;
                    self.process_crypto_deposit(&fresh).await
                } else {
                    Ok(report_of(&self.get_payment(payment.id).await?))
                }
            }
        }
    }

    /// Deposit phase: move custodied funds into the platform wallet, then
    /// credit the merchant. Runs only for the claim winner. A deposit
    /// failure is terminal for the payment and never credits the ledger;
    /// funds recovery goes through a manual dispute ticket.
    async fn process_crypto_deposit(
        &self,
        payment: &payment_transaction::Model,
    ) -> Result<PaymentStatusReport, ServiceError> {
        let wallet_id = payment.platform_wallet_id.ok_or_else(|| {
            ServiceError::InvalidStatus(format!("payment {} has no wallet", payment.id))
        })?;
        let wallet = self.wallets.get(wallet_id).await?;
        let order_id = payment
            .external_onramp_order_id
            .clone()
            .unwrap_or_default();

        let deposit = self
            .gateway
            .process_deposit(DepositRequest {
                chain: self.config.gateway.network.clone(),
                wallet_address: wallet.address.clone(),
                order_id: order_id.clone(),
            })
            .await;

        match deposit {
            Ok(receipt) if receipt.success => {
                self.advance(
                    payment.id,
                    &[PaymentStatus::CryptoProcessing],
                    payment_transaction::ActiveModel {
                        status: Set(PaymentStatus::Completed),
                        blockchain_hash: Set(receipt.tx_hash.clone()),
                        external_deposit_order_id: Set(Some(order_id)),
                        completed_at: Set(Some(Utc::now())),
                        ..Default::default()
                    },
                )
                .await?;

                let fee = payment.amount_fiat * self.config.platform_fee_rate();
                let net = payment.amount_fiat - fee;
                let reference = payment
                    .order_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| payment.id.to_string());

                self.ledger
                    .apply_entry(ApplyEntryInput {
                        store_id: payment.store_id,
                        amount: net,
                        transaction_type: LedgerTransactionType::Sale,
                        transaction_reference: reference,
                        description: format!(
                            "Sale of {} {} (platform fee {})",
                            payment.amount_fiat, payment.fiat_currency, fee
                        ),
                        currency: payment.fiat_currency.clone(),
                        payment_id: Some(payment.id),
                        payout_id: None,
                    })
                    .await?;

                self.event_sender
                    .send_or_log(Event::PaymentCompleted {
                        payment_id: payment.id,
                        store_id: payment.store_id,
                        amount_credited: net,
                    })
                    .await;

                info!(payment_id = %payment.id, %net, "payment completed and merchant credited");
                Ok(report_of(&self.get_payment(payment.id).await?))
            }
            Ok(_) => {
                self.handle_deposit_failure(payment, "deposit rejected by gateway")
                    .await
            }
            Err(e) => {
                self.handle_deposit_failure(payment, &format!("deposit failed: {}", e.message))
                    .await
            }
        }
    }

    /// Deposit failures strand customer funds at the gateway: record the
    /// failure, open a dispute ticket, never credit.
    async fn handle_deposit_failure(
        &self,
        payment: &payment_transaction::Model,
        reason: &str,
    ) -> Result<PaymentStatusReport, ServiceError> {
        error!(payment_id = %payment.id, reason, "crypto deposit failed");
        self.fail_payment(payment.id, payment.store_id, reason).await?;

        if let Some(order_id) = &payment.external_onramp_order_id {
            if let Err(e) = self
                .gateway
                .create_dispute_ticket(DisputeTicketRequest {
                    kind: DisputeKind::Onramp,
                    order_id: order_id.clone(),
                    description: format!("payment {}: {}", payment.id, reason),
                })
                .await
            {
                warn!(payment_id = %payment.id, error = %e, "failed to open dispute ticket");
            }
        }

        Ok(report_of(&self.get_payment(payment.id).await?))
    }

    /// Mark a completed payment refunded and reverse the net credit.
    #[instrument(skip(self))]
    pub async fn mark_refunded(
        &self,
        payment_id: Uuid,
        reason: Option<String>,
    ) -> Result<PaymentStatusReport, ServiceError> {
        let payment = self.get_payment(payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(ServiceError::InvalidStatus(format!(
                "payment {} is {:?}; only completed payments can be refunded",
                payment_id, payment.status
            )));
        }

        let fee = payment.amount_fiat * self.config.platform_fee_rate();
        let net = payment.amount_fiat - fee;

        // Reverse the credit before touching the status. If the merchant
        // already withdrew the funds this fails with InsufficientBalance and
        // the payment stays Completed; Refunded is terminal, so a row marked
        // refunded without its ledger debit could never be repaired.
        self.ledger
            .apply_entry(ApplyEntryInput {
                store_id: payment.store_id,
                amount: -net,
                transaction_type: LedgerTransactionType::Refund,
                transaction_reference: payment_id.to_string(),
                description: reason
                    .clone()
                    .unwrap_or_else(|| "payment refunded".to_string()),
                currency: payment.fiat_currency.clone(),
                payment_id: Some(payment_id),
                payout_id: None,
            })
            .await?;

        let claimed = self
            .advance(
                payment_id,
                &[PaymentStatus::Completed],
                payment_transaction::ActiveModel {
                    status: Set(PaymentStatus::Refunded),
                    error_message: Set(reason),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            // A concurrent refund won between our debit and the claim; put
            // the funds back so the payment carries exactly one refund.
            self.ledger
                .apply_entry(ApplyEntryInput {
                    store_id: payment.store_id,
                    amount: net,
                    transaction_type: LedgerTransactionType::Adjustment,
                    transaction_reference: payment_id.to_string(),
                    description: "duplicate refund attempt reversed".to_string(),
                    currency: payment.fiat_currency.clone(),
                    payment_id: Some(payment_id),
                    payout_id: None,
                })
                .await?;
            return Err(ServiceError::ConcurrentModification(payment_id));
        }

        self.event_sender
            .send_or_log(Event::PaymentRefunded {
                payment_id,
                store_id: payment.store_id,
            })
            .await;

        Ok(report_of(&self.get_payment(payment_id).await?))
    }

    /// Reconciliation hook: fail a payment that went stale before the STK
    /// push was ever initiated. No customer money is in flight yet.
    pub async fn fail_stranded(
        &self,
        payment_id: Uuid,
        store_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.fail_payment(
            payment_id,
            store_id,
            "payment initiation was interrupted and never reached the customer",
        )
        .await
    }

    pub async fn get_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<payment_transaction::Model, ServiceError> {
        payment_transaction::Entity::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment {} not found", payment_id)))
    }

    /// Conditional transition: apply `patch` only if the row is still in one
    /// of `from`. Returns whether this caller won the transition.
    async fn advance(
        &self,
        payment_id: Uuid,
        from: &[PaymentStatus],
        mut patch: payment_transaction::ActiveModel,
    ) -> Result<bool, ServiceError> {
        patch.updated_at = Set(Some(Utc::now()));
        let result = payment_transaction::Entity::update_many()
            .set(patch)
            .filter(payment_transaction::Column::Id.eq(payment_id))
            .filter(payment_transaction::Column::Status.is_in(from.to_vec()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Terminal failure from any non-terminal state.
    async fn fail_payment(
        &self,
        payment_id: Uuid,
        store_id: Uuid,
        reason: &str,
    ) -> Result<(), ServiceError> {
        let claimed = self
            .advance(
                payment_id,
                &[
                    PaymentStatus::Pending,
                    PaymentStatus::QuoteRequested,
                    PaymentStatus::StkInitiated,
                    PaymentStatus::StkSuccess,
                    PaymentStatus::CryptoProcessing,
                ],
                payment_transaction::ActiveModel {
                    status: Set(PaymentStatus::Failed),
                    failed_at: Set(Some(Utc::now())),
                    error_message: Set(Some(reason.to_string())),
                    ..Default::default()
                },
            )
            .await?;

        if claimed {
            error!(%payment_id, reason, "payment failed");
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    payment_id,
                    store_id,
                    reason: reason.to_string(),
                })
                .await;
        }
        Ok(())
    }

    /// Count a still-pending poll against the retry budget; exhausting the
    /// budget fails the payment. The increment happens in the database so
    /// concurrent pollers cannot overwrite each other's attempts.
    async fn note_pending_attempt(
        &self,
        payment: payment_transaction::Model,
    ) -> Result<PaymentStatusReport, ServiceError> {
        payment_transaction::Entity::update_many()
            .col_expr(
                payment_transaction::Column::RetryCount,
                Expr::col(payment_transaction::Column::RetryCount).add(1),
            )
            .col_expr(
                payment_transaction::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(payment_transaction::Column::Id.eq(payment.id))
            .filter(payment_transaction::Column::Status.is_in([
                PaymentStatus::StkInitiated,
                PaymentStatus::StkSuccess,
            ]))
            .exec(&*self.db)
            .await?;

        let fresh = self.get_payment(payment.id).await?;
        if !fresh.status.is_terminal() && fresh.retry_count >= fresh.max_retries {
            self.fail_payment(
                fresh.id,
                fresh.store_id,
                "status polling budget exhausted before confirmation",
            )
            .await?;
            return Ok(report_of(&self.get_payment(payment.id).await?));
        }
        Ok(report_of(&fresh))
    }

    fn initiation_failure(&self, payment_id: Uuid) -> PaymentInitiation {
        PaymentInitiation {
            success: false,
            payment_id,
            external_order_id: None,
            push_initiated: false,
            message: "Payment could not be initiated, please try again".to_string(),
        }
    }
}

fn report_of(payment: &payment_transaction::Model) -> PaymentStatusReport {
    PaymentStatusReport {
        payment_id: payment.id,
        status: payment.status,
        amount_fiat: payment.amount_fiat,
        currency: payment.fiat_currency.clone(),
        external_order_id: payment.external_onramp_order_id.clone(),
        blockchain_hash: payment.blockchain_hash.clone(),
        error_message: payment.error_message.clone(),
    }
}
