//! Platform wallet allocation: pick the least-recently-used custodial wallet
//! on the requested network/currency pair that is active, not in
//! maintenance, and under its daily transaction and volume limits.

use crate::{entities::platform_wallet, errors::ServiceError};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct WalletService {
    db: Arc<DatabaseConnection>,
}

impl WalletService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Allocate a wallet for a settlement of `amount`, bumping its daily
    /// counters. Counters from a previous UTC day are reset on first use.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        network: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<platform_wallet::Model, ServiceError> {
        let now = Utc::now();
        let candidates = platform_wallet::Entity::find()
            .filter(platform_wallet::Column::Network.eq(network))
            .filter(platform_wallet::Column::Currency.eq(currency))
            .filter(platform_wallet::Column::IsActive.eq(true))
            .filter(platform_wallet::Column::InMaintenance.eq(false))
            .order_by_asc(platform_wallet::Column::LastUsedAt)
            .all(&*self.db)
            .await?;

        let wallet = candidates
            .into_iter()
            .find(|w| w.has_capacity(amount, now))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "no settlement wallet available for {}/{}",
                    network, currency
                ))
            })?;

        let (count, volume) = if wallet.counters_stale(now) {
            (0, Decimal::ZERO)
        } else {
            (wallet.daily_tx_count, wallet.daily_volume)
        };

        let updated = platform_wallet::ActiveModel {
            id: Set(wallet.id),
            daily_tx_count: Set(count + 1),
            daily_volume: Set(volume + amount),
            last_used_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        info!(wallet_id = %updated.id, address = %updated.address, "settlement wallet allocated");
        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> Result<platform_wallet::Model, ServiceError> {
        platform_wallet::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("platform wallet {} not found", id)))
    }
}
