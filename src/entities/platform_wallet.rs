use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Custodial settlement wallet bridging the onramp and offramp flows.
/// Allocation skips wallets in maintenance or over their daily limits.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platform_wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub address: String,
    pub network: String,
    pub currency: String,
    pub daily_tx_count: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub daily_volume: Decimal,
    pub daily_tx_limit: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub daily_volume_limit: Decimal,
    pub is_active: bool,
    pub in_maintenance: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the daily counters belong to a previous UTC day and should be
    /// treated as zero.
    pub fn counters_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_used_at {
            Some(last) => last.date_naive() != now.date_naive(),
            None => false,
        }
    }

    pub fn has_capacity(&self, amount: Decimal, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.in_maintenance {
            return false;
        }
        let (count, volume) = if self.counters_stale(now) {
            (0, Decimal::ZERO)
        } else {
            (self.daily_tx_count, self.daily_volume)
        };
        count < self.daily_tx_limit && volume + amount <= self.daily_volume_limit
    }
}
