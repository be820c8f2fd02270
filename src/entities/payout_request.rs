use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payout lifecycle. `Failed` is reachable from any non-terminal state,
/// `Cancelled` only from `Pending`/`Approved`. Once a request is approved
/// its amount is reserved on the store balance until a terminal state, and
/// failed/cancelled requests release that reservation exactly once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        match (self, next) {
            (Pending, Approved) | (Approved, Processing) | (Processing, Completed) => true,
            (Pending, Cancelled) | (Approved, Cancelled) => true,
            (from, Failed) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

/// Destination rail for a payout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    #[sea_orm(string_value = "mobile_money")]
    MobileMoney,
    #[sea_orm(string_value = "bank")]
    Bank,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = PayoutRequest)]
#[sea_orm(table_name = "payout_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount_requested: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub amount_approved: Option<Decimal>,
    pub currency: String,
    pub payout_method: PayoutMethod,
    pub destination: String,
    /// Rail-specific routing detail (bank branch, account name). Audit only.
    #[sea_orm(column_type = "Json", nullable)]
    pub destination_details: Option<Json>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub crypto_amount: Option<Decimal>,
    pub crypto_currency: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 8)))", nullable)]
    pub exchange_rate: Option<Decimal>,
    pub platform_wallet_id: Option<Uuid>,
    pub external_quote_id: Option<String>,
    pub external_offramp_order_id: Option<String>,
    pub blockchain_hash: Option<String>,
    pub status: PayoutStatus,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::platform_wallet::Entity",
        from = "Column::PlatformWalletId",
        to = "super::platform_wallet::Column::Id"
    )]
    PlatformWallet,
}

impl Related<super::platform_wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlatformWallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PayoutStatus::*;

    #[test]
    fn lifecycle_transitions() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Failed, Cancelled] {
            for next in [Pending, Approved, Processing, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}
