use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a customer payment as it moves across the mobile-money rail,
/// the crypto settlement rail, and the merchant ledger.
///
/// Transitions are monotonic along the graph below; `Failed` is reachable
/// from any non-terminal state and `Refunded` only from `Completed`.
///
/// ```text
/// Pending -> QuoteRequested -> StkInitiated -> StkSuccess -> CryptoProcessing -> Completed -> Refunded
///    \____________\_______________\______________\_______________\----> Failed
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "quote_requested")]
    QuoteRequested,
    #[sea_orm(string_value = "stk_initiated")]
    StkInitiated,
    #[sea_orm(string_value = "stk_success")]
    StkSuccess,
    #[sea_orm(string_value = "crypto_processing")]
    CryptoProcessing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }

    /// Transition table for the payment state machine. Orchestrators must
    /// consult this (and claim the transition with a conditional update)
    /// before writing a new status.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, QuoteRequested)
            | (QuoteRequested, StkInitiated)
            | (StkInitiated, StkSuccess)
            | (StkSuccess, CryptoProcessing)
            | (CryptoProcessing, Completed)
            | (Completed, Refunded) => true,
            (from, Failed) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = PaymentTransaction)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub order_id: Option<Uuid>,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount_fiat: Decimal,
    pub fiat_currency: String,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub amount_crypto: Option<Decimal>,
    pub crypto_currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 8)))", nullable)]
    pub exchange_rate: Option<Decimal>,
    pub platform_wallet_id: Option<Uuid>,
    pub external_quote_id: Option<String>,
    pub external_onramp_order_id: Option<String>,
    pub external_deposit_order_id: Option<String>,
    pub blockchain_hash: Option<String>,
    pub status: PaymentStatus,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Free-form audit blob. Never read for correctness decisions.
    #[sea_orm(column_type = "Json", nullable)]
    pub metadata: Option<Json>,
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
    use super::PaymentStatus::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        let path = [
            Pending,
            QuoteRequested,
            StkInitiated,
            StkSuccess,
            CryptoProcessing,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(Completed.can_transition_to(Refunded));
    }

    #[test]
    fn terminal_states_admit_no_exit() {
        for terminal in [Completed, Failed, Refunded] {
            assert!(terminal.is_terminal());
            for next in [
                Pending,
                QuoteRequested,
                StkInitiated,
                StkSuccess,
                CryptoProcessing,
                Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{:?} -> {:?}", terminal, next);
            }
        }
        // Refunded is the single exception out of Completed, tested above.
        assert!(!Failed.can_transition_to(Refunded));
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_state() {
        for from in [Pending, QuoteRequested, StkInitiated, StkSuccess, CryptoProcessing] {
            assert!(from.can_transition_to(Failed));
        }
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!StkSuccess.can_transition_to(StkInitiated));
        assert!(!CryptoProcessing.can_transition_to(StkSuccess));
        assert!(!QuoteRequested.can_transition_to(Pending));
    }
}
