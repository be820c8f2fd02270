use crate::entities::payout_request::{self, PayoutMethod};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payouts::InitiatePayoutRequest;
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "store_id": "550e8400-e29b-41d4-a716-446655440000",
    "amount": "5000.00",
    "currency": "KES",
    "payout_method": "mobile_money",
    "destination": "254712345678"
}))]
pub struct CreatePayoutHandlerRequest {
    pub store_id: Uuid,
    /// Amount to withdraw
    #[schema(example = "5000.00")]
    pub amount: Decimal,
    /// Currency code (ISO 4217, defaults to KES)
    pub currency: Option<String>,
    /// Destination rail (mobile_money, bank)
    pub payout_method: String,
    /// Phone number or bank account receiving the funds
    pub destination: String,
    /// Rail-specific routing detail (bank name, branch)
    pub destination_details: Option<serde_json::Value>,
}

/// Request a merchant payout
#[utoipa::path(
    post,
    path = "/api/v1/payouts",
    request_body = CreatePayoutHandlerRequest,
    responses(
        (status = 201, description = "Payout approved and queued", body = crate::ApiResponse<payout_request::Model>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient balance or below minimum", body = crate::errors::ErrorResponse)
    ),
    tag = "Payouts"
)]
pub async fn initiate_payout(
    State(state): State<AppState>,
    Json(request): Json<CreatePayoutHandlerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<payout_request::Model>>), ServiceError> {
    let payout_method = match request.payout_method.to_lowercase().as_str() {
        "mobile_money" => PayoutMethod::MobileMoney,
        "bank" => PayoutMethod::Bank,
        other => {
            return Err(ServiceError::ValidationError(format!(
                "invalid payout method: {}",
                other
            )))
        }
    };

    let payout_request = InitiatePayoutRequest {
        store_id: request.store_id,
        amount: request.amount,
        currency: request.currency.unwrap_or_else(|| "KES".to_string()),
        payout_method,
        destination: request.destination,
        destination_details: request.destination_details,
    };
    payout_request.validate()?;

    let payout = state
        .services
        .payouts
        .initiate_business_payout(payout_request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(payout))))
}

/// Get payout by ID
#[utoipa::path(
    get,
    path = "/api/v1/payouts/:payout_id",
    params(
        ("payout_id" = Uuid, Path, description = "Payout ID")
    ),
    responses(
        (status = 200, description = "Payout details", body = crate::ApiResponse<payout_request::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payouts"
)]
pub async fn get_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<Uuid>,
) -> Result<Json<ApiResponse<payout_request::Model>>, ServiceError> {
    let payout = state.services.payouts.get_payout(payout_id).await?;
    Ok(Json(ApiResponse::success(payout)))
}

/// Cancel a payout that has not started processing
#[utoipa::path(
    post,
    path = "/api/v1/payouts/:payout_id/cancel",
    params(
        ("payout_id" = Uuid, Path, description = "Payout ID")
    ),
    responses(
        (status = 200, description = "Payout cancelled", body = crate::ApiResponse<payout_request::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 400, description = "Payout already processing", body = crate::errors::ErrorResponse)
    ),
    tag = "Payouts"
)]
pub async fn cancel_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<Uuid>,
) -> Result<Json<ApiResponse<payout_request::Model>>, ServiceError> {
    let payout = state.services.payouts.cancel_payout(payout_id).await?;
    Ok(Json(ApiResponse::success(payout)))
}

/// Payout routes
pub fn payout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(initiate_payout))
        .route("/:payout_id", get(get_payout))
        .route("/:payout_id/cancel", post(cancel_payout))
}
