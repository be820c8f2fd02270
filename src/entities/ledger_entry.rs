use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What kind of money movement a ledger entry records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum LedgerTransactionType {
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "payout")]
    Payout,
    #[sea_orm(string_value = "fee")]
    Fee,
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

/// Immutable, append-only record of a single balance mutation for a store.
///
/// `balance_after = balance_before + amount` holds for every entry, and the
/// store's current total balance equals the `balance_after` of its most
/// recent entry. Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = LedgerEntry)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub transaction_type: LedgerTransactionType,
    pub transaction_reference: String,
    /// Signed: credits positive, debits negative.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_before: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_after: Decimal,
    pub description: String,
    pub payment_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}
