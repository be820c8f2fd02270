use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-store running balance. `available` is spendable, `reserved` is
/// earmarked for in-flight payouts. Mutated only by the ledger service,
/// serialized per store; `available + reserved` always equals the fold of
/// the store's ledger entries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub store_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub available: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub reserved: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub lifetime_earnings: Decimal,
    pub currency: String,
    /// Smallest payout a merchant may request.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub minimum_payout_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Total funds held for the store across both buckets.
    pub fn total(&self) -> Decimal {
        self.available + self.reserved
    }
}
