//! Single mutation point for merchant money. Every balance-affecting event
//! flows through [`LedgerService::apply_entry`] or the reservation
//! primitives; nothing else writes `store_balances`.

use crate::{
    entities::{
        ledger_entry::{self, LedgerTransactionType},
        store_balance,
    },
    errors::ServiceError,
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for one ledger mutation.
#[derive(Debug, Clone)]
pub struct ApplyEntryInput {
    pub store_id: Uuid,
    /// Signed: credits positive, debits negative.
    pub amount: Decimal,
    pub transaction_type: LedgerTransactionType,
    pub transaction_reference: String,
    pub description: String,
    pub currency: String,
    pub payment_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
}

pub struct LedgerService {
    db: Arc<DatabaseConnection>,
    /// Per-store async mutexes serializing every read-modify-write on a
    /// store's balance. Two concurrent mutations for the same store must not
    /// interleave; different stores proceed in parallel.
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl LedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            locks: DashMap::new(),
        }
    }

    fn store_lock(&self, store_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(store_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Apply one balance mutation and append the immutable ledger row.
    ///
    /// `payout`-type entries debit the reserved bucket (the funds were moved
    /// out of `available` when the payout was approved); every other type
    /// moves `available`. The running `balance_before`/`balance_after` pair
    /// tracks the store's total holdings across both buckets.
    #[instrument(skip(self, input), fields(store_id = %input.store_id, amount = %input.amount))]
    pub async fn apply_entry(
        &self,
        input: ApplyEntryInput,
    ) -> Result<ledger_entry::Model, ServiceError> {
        if input.amount == Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "ledger amount must be non-zero".to_string(),
            ));
        }

        let lock = self.store_lock(input.store_id);
        let _guard = lock.lock().await;

        let balance = self
            .get_or_create_balance(input.store_id, &input.currency)
            .await?;

        let (new_available, new_reserved) = match input.transaction_type {
            LedgerTransactionType::Payout => {
                let reserved = balance.reserved + input.amount;
                if reserved < Decimal::ZERO {
                    return Err(ServiceError::InsufficientBalance(format!(
                        "payout debit {} exceeds reserved balance {}",
                        input.amount.abs(),
                        balance.reserved
                    )));
                }
                (balance.available, reserved)
            }
            _ => {
                let available = balance.available + input.amount;
                if available < Decimal::ZERO {
                    return Err(ServiceError::InsufficientBalance(format!(
                        "debit {} exceeds available balance {}",
                        input.amount.abs(),
                        balance.available
                    )));
                }
                (available, balance.reserved)
            }
        };

        let balance_before = balance.total();
        let balance_after = balance_before + input.amount;

        let lifetime = if input.transaction_type == LedgerTransactionType::Sale {
            balance.lifetime_earnings + input.amount
        } else {
            balance.lifetime_earnings
        };

        store_balance::ActiveModel {
            store_id: Set(input.store_id),
            available: Set(new_available),
            reserved: Set(new_reserved),
            lifetime_earnings: Set(lifetime),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        let entry = ledger_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(input.store_id),
            transaction_type: Set(input.transaction_type),
            transaction_reference: Set(input.transaction_reference),
            amount: Set(input.amount),
            currency: Set(input.currency),
            balance_before: Set(balance_before),
            balance_after: Set(balance_after),
            description: Set(input.description),
            payment_id: Set(input.payment_id),
            payout_id: Set(input.payout_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(
            entry_id = %entry.id,
            transaction_type = ?entry.transaction_type,
            balance_after = %entry.balance_after,
            "ledger entry applied"
        );
        Ok(entry)
    }

    /// Move funds from available to reserved for an in-flight payout.
    /// Serialized per store so concurrent payout requests cannot both pass
    /// the balance check.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        store_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<(), ServiceError> {
        let lock = self.store_lock(store_id);
        let _guard = lock.lock().await;

        let balance = self.get_or_create_balance(store_id, currency).await?;
        if balance.available < amount {
            return Err(ServiceError::InsufficientBalance(format!(
                "available {} is less than requested reservation {}",
                balance.available, amount
            )));
        }

        store_balance::ActiveModel {
            store_id: Set(store_id),
            available: Set(balance.available - amount),
            reserved: Set(balance.reserved + amount),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        info!(%store_id, %amount, "funds reserved");
        Ok(())
    }

    /// Return reserved funds to available (payout failed or was cancelled).
    #[instrument(skip(self))]
    pub async fn release(&self, store_id: Uuid, amount: Decimal) -> Result<(), ServiceError> {
        let lock = self.store_lock(store_id);
        let _guard = lock.lock().await;

        let balance = self
            .balance(store_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no balance for store {}", store_id)))?;
        if balance.reserved < amount {
            return Err(ServiceError::Conflict(format!(
                "release {} exceeds reserved balance {}",
                amount, balance.reserved
            )));
        }

        store_balance::ActiveModel {
            store_id: Set(store_id),
            available: Set(balance.available + amount),
            reserved: Set(balance.reserved - amount),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        info!(%store_id, %amount, "reservation released");
        Ok(())
    }

    pub async fn balance(
        &self,
        store_id: Uuid,
    ) -> Result<Option<store_balance::Model>, ServiceError> {
        Ok(store_balance::Entity::find_by_id(store_id)
            .one(&*self.db)
            .await?)
    }

    pub async fn get_or_create_balance(
        &self,
        store_id: Uuid,
        currency: &str,
    ) -> Result<store_balance::Model, ServiceError> {
        if let Some(existing) = self.balance(store_id).await? {
            return Ok(existing);
        }
        let created = store_balance::ActiveModel {
            store_id: Set(store_id),
            available: Set(Decimal::ZERO),
            reserved: Set(Decimal::ZERO),
            lifetime_earnings: Set(Decimal::ZERO),
            currency: Set(currency.to_string()),
            minimum_payout_amount: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;
        Ok(created)
    }

    /// Consistency check: the fold over all entries must equal the store's
    /// current total balance, and consecutive entries must chain
    /// balance_before/balance_after.
    pub async fn verify_conservation(&self, store_id: Uuid) -> Result<bool, ServiceError> {
        let entries = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::StoreId.eq(store_id))
            .order_by_asc(ledger_entry::Column::CreatedAt)
            .order_by_asc(ledger_entry::Column::BalanceAfter)
            .all(&*self.db)
            .await?;

        let mut running = Decimal::ZERO;
        for entry in &entries {
            if entry.balance_before != running {
                return Ok(false);
            }
            if entry.balance_after != entry.balance_before + entry.amount {
                return Ok(false);
            }
            running = entry.balance_after;
        }

        let total = self
            .balance(store_id)
            .await?
            .map(|b| b.total())
            .unwrap_or(Decimal::ZERO);
        Ok(running == total)
    }
}
