//! Background workers: outbox-driven payout processing, stale payment
//! reconciliation, and cart reminder/expiry sweeps.
//!
//! Each worker exposes a `run_*_once` function that performs a single pass,
//! so tests can drive it deterministically, plus a `spawn_*` loop for the
//! server.

use crate::{
    config::AppConfig,
    entities::{
        cart_session::{self, CartStatus},
        outbox_task::{self, TaskStatus, TASK_PROCESS_PAYOUT},
        payment_transaction::{self, PaymentStatus},
    },
    errors::ServiceError,
    messaging::MessageSender,
    services::{payouts::PayoutProgress, PaymentService, PayoutService},
};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const TASK_BATCH_SIZE: u64 = 20;
const CART_SWEEP_BATCH: u64 = 100;

/// One pass over claimable outbox tasks. Returns how many tasks were
/// executed (successfully or not).
#[instrument(skip_all)]
pub async fn run_payout_tasks_once(
    db: &DatabaseConnection,
    payouts: &PayoutService,
    config: &AppConfig,
) -> Result<usize, ServiceError> {
    let now = Utc::now();
    let due = outbox_task::Entity::find()
        .filter(outbox_task::Column::Status.eq(TaskStatus::Pending))
        .filter(outbox_task::Column::AvailableAt.lte(now))
        .order_by_asc(outbox_task::Column::AvailableAt)
        .limit(TASK_BATCH_SIZE)
        .all(db)
        .await?;

    let mut executed = 0;
    for task in due {
        // Claim the task; a competing worker instance loses silently.
        let claim = outbox_task::Entity::update_many()
            .set(outbox_task::ActiveModel {
                status: Set(TaskStatus::Processing),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(outbox_task::Column::Id.eq(task.id))
            .filter(outbox_task::Column::Status.eq(TaskStatus::Pending))
            .exec(db)
            .await?;
        if claim.rows_affected != 1 {
            continue;
        }

        executed += 1;
        match execute_task(&task, payouts).await {
            Ok(true) => complete_task(db, task.id).await?,
            Ok(false) => retry_task(db, &task, "offramp still in flight", config).await?,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "payout task attempt failed");
                retry_task(db, &task, &e.to_string(), config).await?;
            }
        }
    }
    Ok(executed)
}

/// Returns Ok(true) when the task reached a terminal outcome and Ok(false)
/// when it should be retried later.
async fn execute_task(
    task: &outbox_task::Model,
    payouts: &PayoutService,
) -> Result<bool, ServiceError> {
    if task.task_type != TASK_PROCESS_PAYOUT {
        return Err(ServiceError::InvalidStatus(format!(
            "unknown task type {}",
            task.task_type
        )));
    }

    let payout_id: Uuid = task
        .payload
        .get("payout_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ServiceError::SerializationError(format!("task {} has no payout_id", task.id))
        })?;

    match payouts.process_business_payout(payout_id).await? {
        PayoutProgress::Settled | PayoutProgress::Failed | PayoutProgress::Skipped => Ok(true),
        PayoutProgress::InFlight => Ok(false),
    }
}

async fn complete_task(db: &DatabaseConnection, task_id: Uuid) -> Result<(), ServiceError> {
    outbox_task::ActiveModel {
        id: Set(task_id),
        status: Set(TaskStatus::Completed),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(())
}

/// Requeue with exponential backoff, or park the task as failed once the
/// attempt budget is spent. A parked task leaves its payout in whatever
/// state it reached; ops follows up from the task's last_error.
async fn retry_task(
    db: &DatabaseConnection,
    task: &outbox_task::Model,
    last_error: &str,
    config: &AppConfig,
) -> Result<(), ServiceError> {
    let attempts = task.attempts + 1;
    if attempts >= task.max_attempts {
        error!(task_id = %task.id, attempts, last_error, "payout task exhausted its attempts");
        outbox_task::ActiveModel {
            id: Set(task.id),
            status: Set(TaskStatus::Failed),
            attempts: Set(attempts),
            last_error: Set(Some(last_error.to_string())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(db)
        .await?;
        return Ok(());
    }

    let backoff_secs = (config.worker_poll_secs as i64) << attempts.min(8);
    outbox_task::ActiveModel {
        id: Set(task.id),
        status: Set(TaskStatus::Pending),
        attempts: Set(attempts),
        last_error: Set(Some(last_error.to_string())),
        available_at: Set(Utc::now() + ChronoDuration::seconds(backoff_secs)),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(())
}

/// One reconciliation pass over payments that stopped moving.
///
/// Payments stale before the STK push exists upstream are failed outright.
/// Payments waiting on the customer are re-polled through the normal status
/// path, which spends their retry budget. Payments stuck in the deposit
/// phase are only reported; money may have moved and recovery is manual.
#[instrument(skip_all)]
pub async fn run_reconciliation_once(
    db: &DatabaseConnection,
    payments: &PaymentService,
    config: &AppConfig,
) -> Result<usize, ServiceError> {
    let cutoff = Utc::now() - ChronoDuration::seconds(config.stale_payment_age_secs as i64);
    let staleness = Condition::any()
        .add(payment_transaction::Column::UpdatedAt.lt(cutoff))
        .add(
            Condition::all()
                .add(payment_transaction::Column::UpdatedAt.is_null())
                .add(payment_transaction::Column::InitiatedAt.lt(cutoff)),
        );

    let stale = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::Status.is_in([
            PaymentStatus::Pending,
            PaymentStatus::QuoteRequested,
            PaymentStatus::StkInitiated,
            PaymentStatus::StkSuccess,
            PaymentStatus::CryptoProcessing,
        ]))
        .filter(staleness)
        .all(db)
        .await?;

    let mut touched = 0;
    for payment in stale {
        touched += 1;
        match payment.status {
            PaymentStatus::Pending | PaymentStatus::QuoteRequested => {
                info!(payment_id = %payment.id, "failing payment stranded before STK push");
                if let Err(e) = payments
                    .fail_stranded(payment.id, payment.store_id)
                    .await
                {
                    warn!(payment_id = %payment.id, error = %e, "failed to reconcile stranded payment");
                }
            }
            PaymentStatus::StkInitiated | PaymentStatus::StkSuccess => {
                if let Err(e) = payments.check_payment_status(payment.id).await {
                    warn!(payment_id = %payment.id, error = %e, "stale payment re-poll failed");
                }
            }
            PaymentStatus::CryptoProcessing => {
                error!(
                    payment_id = %payment.id,
                    "payment stuck in deposit phase; manual recovery required"
                );
            }
            _ => {}
        }
    }
    Ok(touched)
}

/// One pass over idle carts: remind once after the reminder window, expire
/// after the expiry window.
#[instrument(skip_all)]
pub async fn run_cart_sweep_once(
    db: &DatabaseConnection,
    messaging: &dyn MessageSender,
    config: &AppConfig,
) -> Result<usize, ServiceError> {
    let now = Utc::now();
    let mut touched = 0;

    // Expiry first so a cart past both windows never gets a reminder.
    let expiry_cutoff = now - ChronoDuration::seconds(config.cart_expiry_secs as i64);
    let expired = cart_session::Entity::update_many()
        .set(cart_session::ActiveModel {
            status: Set(CartStatus::Expired),
            updated_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(cart_session::Column::Status.eq(CartStatus::Active))
        .filter(cart_session::Column::LastActivityAt.lt(expiry_cutoff))
        .exec(db)
        .await?;
    touched += expired.rows_affected as usize;

    let reminder_cutoff = now - ChronoDuration::seconds(config.cart_reminder_secs as i64);
    let idle = cart_session::Entity::find()
        .filter(cart_session::Column::Status.eq(CartStatus::Active))
        .filter(cart_session::Column::LastActivityAt.lt(reminder_cutoff))
        .filter(cart_session::Column::ReminderSentAt.is_null())
        .limit(CART_SWEEP_BATCH)
        .all(db)
        .await?;

    for cart in idle {
        let items = cart.item_snapshots().unwrap_or_default();
        if items.is_empty() {
            continue;
        }
        touched += 1;

        let body = format!(
            "You left {} item(s) worth {} {} in your cart. Reply \"checkout\" to complete your order.",
            items.iter().map(|i| i.quantity).sum::<i32>(),
            cart.total,
            cart.currency
        );
        if let Err(e) = messaging.send_text(&cart.customer_phone, &body).await {
            warn!(cart_id = %cart.id, error = %e, "cart reminder delivery failed");
            continue;
        }

        cart_session::ActiveModel {
            id: Set(cart.id),
            reminder_sent_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .update(db)
        .await?;
    }
    Ok(touched)
}

pub fn spawn_payout_worker(
    db: Arc<DatabaseConnection>,
    payouts: Arc<PayoutService>,
    config: Arc<AppConfig>,
) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(config.worker_poll_secs));
        loop {
            tick.tick().await;
            if let Err(e) = run_payout_tasks_once(&db, &payouts, &config).await {
                error!(error = %e, "payout worker pass failed");
            }
        }
    });
}

pub fn spawn_reconciliation_worker(
    db: Arc<DatabaseConnection>,
    payments: Arc<PaymentService>,
    config: Arc<AppConfig>,
) {
    tokio::spawn(async move {
        let mut tick =
            tokio::time::interval(Duration::from_secs(config.stale_payment_age_secs.max(60) as u64));
        loop {
            tick.tick().await;
            if let Err(e) = run_reconciliation_once(&db, &payments, &config).await {
                error!(error = %e, "reconciliation pass failed");
            }
        }
    });
}

pub fn spawn_cart_sweeper(
    db: Arc<DatabaseConnection>,
    messaging: Arc<dyn MessageSender>,
    config: Arc<AppConfig>,
) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            if let Err(e) = run_cart_sweep_once(&db, messaging.as_ref(), &config).await {
                error!(error = %e, "cart sweep failed");
            }
        }
    });
}
