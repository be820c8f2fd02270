use crate::entities::payment_transaction;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payments::{InitiatePaymentRequest, PaymentInitiation, PaymentStatusReport};
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
    "amount": "1000.00",
    "currency": "KES",
    "customer_phone": "254712345678"
}))]
pub struct CreatePaymentHandlerRequest {
    /// Store receiving the payment
    pub store_id: Uuid,
    /// Order being paid for, if one exists
    pub order_id: Option<Uuid>,
    /// Amount in fiat
    #[schema(example = "1000.00")]
    pub amount: Decimal,
    /// Currency code (ISO 4217, defaults to KES)
    #[schema(example = "KES")]
    pub currency: Option<String>,
    /// Customer mobile-money phone number
    #[schema(example = "254712345678")]
    pub customer_phone: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundPaymentHandlerRequest {
    /// Reason for the refund
    pub reason: Option<String>,
}

/// Initiate a customer payment (sends the STK push)
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = CreatePaymentHandlerRequest,
    responses(
        (status = 201, description = "Payment initiated", body = crate::ApiResponse<PaymentInitiation>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentHandlerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentInitiation>>), ServiceError> {
    let payment_request = InitiatePaymentRequest {
        store_id: request.store_id,
        order_id: request.order_id,
        amount: request.amount,
        currency: request.currency.unwrap_or_else(|| "KES".to_string()),
        customer_phone: request.customer_phone,
        customer_email: request.customer_email,
    };
    payment_request.validate()?;

    let initiation = state
        .services
        .payments
        .initiate_customer_payment(payment_request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(initiation))))
}

/// Get payment by ID
#[utoipa::path(
    get,
    path = "/api/v1/payments/:payment_id",
    params(
        ("payment_id" = Uuid, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment details", body = crate::ApiResponse<payment_transaction::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<payment_transaction::Model>>, ServiceError> {
    let payment = state.services.payments.get_payment(payment_id).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// Poll payment status (advances the settlement state machine)
#[utoipa::path(
    get,
    path = "/api/v1/payments/:payment_id/status",
    params(
        ("payment_id" = Uuid, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Current payment status", body = crate::ApiResponse<PaymentStatusReport>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn check_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentStatusReport>>, ServiceError> {
    let report = state
        .services
        .payments
        .check_payment_status(payment_id)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Refund a completed payment
#[utoipa::path(
    post,
    path = "/api/v1/payments/:payment_id/refund",
    params(
        ("payment_id" = Uuid, Path, description = "Payment ID")
    ),
    request_body = RefundPaymentHandlerRequest,
    responses(
        (status = 200, description = "Payment refunded", body = crate::ApiResponse<PaymentStatusReport>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 400, description = "Payment not refundable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<RefundPaymentHandlerRequest>,
) -> Result<Json<ApiResponse<PaymentStatusReport>>, ServiceError> {
    let report = state
        .services
        .payments
        .mark_refunded(payment_id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(initiate_payment))
        .route("/:payment_id", get(get_payment))
        .route("/:payment_id/status", get(check_payment_status))
        .route("/:payment_id/refund", post(refund_payment))
}
