use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "checked_out")]
    CheckedOut,
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// One line of a cart, snapshotted from the product at add time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItemSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl CartItemSnapshot {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Per-(store, customer phone) conversational cart. Items are stored as JSON
/// snapshots; an idle non-empty cart gets one reminder after the reminder
/// window and is expired after the cleanup window.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub customer_phone: String,
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total: Decimal,
    pub currency: String,
    pub status: CartStatus,
    pub last_activity_at: DateTime<Utc>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn item_snapshots(&self) -> Result<Vec<CartItemSnapshot>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}

/// Recompute the cart total from its item snapshots.
pub fn total_of(items: &[CartItemSnapshot]) -> Decimal {
    items.iter().map(CartItemSnapshot::line_total).sum()
}
