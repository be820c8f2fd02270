//! Read-side merchant finance queries: balance summary, recent ledger
//! activity, recent payouts.

use crate::{
    entities::{
        ledger_entry::{self, LedgerTransactionType},
        payout_request, store_balance,
    },
    errors::ServiceError,
    services::ledger::LedgerService,
};
use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinanceSummary {
    pub store_id: Uuid,
    pub available: Decimal,
    pub reserved: Decimal,
    pub total: Decimal,
    pub lifetime_earnings: Decimal,
    pub currency: String,
    pub minimum_payout_amount: Decimal,
    /// Net sale credits since UTC midnight.
    pub today_revenue: Decimal,
    /// Sales credited since UTC midnight.
    pub today_transactions: u64,
    pub pending_payouts: u64,
    /// Sum of amounts still reserved by non-terminal payouts.
    pub pending_payout_total: Decimal,
}

pub struct FinanceService {
    db: Arc<DatabaseConnection>,
    ledger: Arc<LedgerService>,
}

impl FinanceService {
    pub fn new(db: Arc<DatabaseConnection>, ledger: Arc<LedgerService>) -> Self {
        Self { db, ledger }
    }

    pub async fn summary(&self, store_id: Uuid) -> Result<FinanceSummary, ServiceError> {
        let balance = self
            .ledger
            .balance(store_id)
            .await?
            .unwrap_or_else(|| empty_balance(store_id));

        let day_start = Utc::now()
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let todays_sales = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::StoreId.eq(store_id))
            .filter(ledger_entry::Column::TransactionType.eq(LedgerTransactionType::Sale))
            .filter(ledger_entry::Column::CreatedAt.gte(day_start))
            .all(&*self.db)
            .await?;
        let today_revenue = todays_sales.iter().map(|e| e.amount).sum();
        let today_transactions = todays_sales.len() as u64;

        let pending = payout_request::Entity::find()
            .filter(payout_request::Column::StoreId.eq(store_id))
            .filter(payout_request::Column::Status.is_in([
                payout_request::PayoutStatus::Pending,
                payout_request::PayoutStatus::Approved,
                payout_request::PayoutStatus::Processing,
            ]))
            .all(&*self.db)
            .await?;
        let pending_payout_total = pending
            .iter()
            .map(|p| p.amount_approved.unwrap_or(p.amount_requested))
            .sum();

        Ok(FinanceSummary {
            store_id,
            available: balance.available,
            reserved: balance.reserved,
            total: balance.total(),
            lifetime_earnings: balance.lifetime_earnings,
            currency: balance.currency,
            minimum_payout_amount: balance.minimum_payout_amount,
            today_revenue,
            today_transactions,
            pending_payouts: pending.len() as u64,
            pending_payout_total,
        })
    }

    /// Most recent ledger entries, newest first.
    pub async fn recent_transactions(
        &self,
        store_id: Uuid,
        limit: u64,
    ) -> Result<Vec<ledger_entry::Model>, ServiceError> {
        Ok(ledger_entry::Entity::find()
            .filter(ledger_entry::Column::StoreId.eq(store_id))
            .order_by_desc(ledger_entry::Column::CreatedAt)
            .paginate(&*self.db, limit.max(1))
            .fetch_page(0)
            .await?)
    }

    pub async fn recent_payouts(
        &self,
        store_id: Uuid,
        limit: u64,
    ) -> Result<Vec<payout_request::Model>, ServiceError> {
        Ok(payout_request::Entity::find()
            .filter(payout_request::Column::StoreId.eq(store_id))
            .order_by_desc(payout_request::Column::RequestedAt)
            .paginate(&*self.db, limit.max(1))
            .fetch_page(0)
            .await?)
    }
}

fn empty_balance(store_id: Uuid) -> store_balance::Model {
    store_balance::Model {
        store_id,
        available: Decimal::ZERO,
        reserved: Decimal::ZERO,
        lifetime_earnings: Decimal::ZERO,
        currency: "KES".to_string(),
        minimum_payout_amount: Decimal::ZERO,
        created_at: chrono::Utc::now(),
        updated_at: None,
    }
}
