use super::common::PaginationParams;
use crate::entities::{ledger_entry, payout_request};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::finance::FinanceSummary;
use crate::ApiResponse;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use uuid::Uuid;

/// Merchant balance summary
#[utoipa::path(
    get,
    path = "/api/v1/stores/:store_id/finance/summary",
    params(
        ("store_id" = Uuid, Path, description = "Store ID")
    ),
    responses(
        (status = 200, description = "Balance summary", body = crate::ApiResponse<FinanceSummary>)
    ),
    tag = "Finance"
)]
pub async fn finance_summary(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> Result<axum::Json<ApiResponse<FinanceSummary>>, ServiceError> {
    let summary = state.services.finance.summary(store_id).await?;
    Ok(axum::Json(ApiResponse::success(summary)))
}

/// Recent ledger entries for a store, newest first
#[utoipa::path(
    get,
    path = "/api/v1/stores/:store_id/finance/transactions",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Recent ledger entries", body = crate::ApiResponse<Vec<ledger_entry::Model>>)
    ),
    tag = "Finance"
)]
pub async fn finance_transactions(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<axum::Json<ApiResponse<Vec<ledger_entry::Model>>>, ServiceError> {
    let entries = state
        .services
        .finance
        .recent_transactions(store_id, pagination.effective_limit())
        .await?;
    Ok(axum::Json(ApiResponse::success(entries)))
}

/// Recent payouts for a store, newest first
#[utoipa::path(
    get,
    path = "/api/v1/stores/:store_id/finance/payouts",
    params(
        ("store_id" = Uuid, Path, description = "Store ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Recent payouts", body = crate::ApiResponse<Vec<payout_request::Model>>)
    ),
    tag = "Finance"
)]
pub async fn finance_payouts(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<axum::Json<ApiResponse<Vec<payout_request::Model>>>, ServiceError> {
    let payouts = state
        .services
        .finance
        .recent_payouts(store_id, pagination.effective_limit())
        .await?;
    Ok(axum::Json(ApiResponse::success(payouts)))
}

/// Store finance routes
pub fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/:store_id/finance/summary", get(finance_summary))
        .route("/:store_id/finance/transactions", get(finance_transactions))
        .route("/:store_id/finance/payouts", get(finance_payouts))
}
