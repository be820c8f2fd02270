//! OpenAPI document and swagger UI wiring.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PesaFlow Settlement API",
        description = r#"
Payment settlement orchestration for multi-tenant conversational commerce.

Collects customer payments over mobile money, settles them through a crypto
on/off-ramp into custodial platform wallets, and credits merchants on an
append-only ledger. Merchant withdrawals run through the same gateway in the
opposite direction.
        "#,
        version = env!("CARGO_PKG_VERSION"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Payments", description = "Customer payment collection and settlement"),
        (name = "Payouts", description = "Merchant withdrawals"),
        (name = "Finance", description = "Merchant balances and ledger history"),
        (name = "Webhooks", description = "Messaging provider callbacks"),
    ),
    paths(
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::check_payment_status,
        crate::handlers::payments::refund_payment,
        crate::handlers::payouts::initiate_payout,
        crate::handlers::payouts::get_payout,
        crate::handlers::payouts::cancel_payout,
        crate::handlers::finance::finance_summary,
        crate::handlers::finance::finance_transactions,
        crate::handlers::finance::finance_payouts,
        crate::handlers::webhooks::message_webhook,
    ),
    components(schemas(
        crate::handlers::payments::CreatePaymentHandlerRequest,
        crate::handlers::payments::RefundPaymentHandlerRequest,
        crate::handlers::payouts::CreatePayoutHandlerRequest,
        crate::services::payments::PaymentInitiation,
        crate::services::payments::PaymentStatusReport,
        crate::services::finance::FinanceSummary,
        crate::entities::payment_transaction::Model,
        crate::entities::payment_transaction::PaymentStatus,
        crate::entities::payout_request::Model,
        crate::entities::payout_request::PayoutStatus,
        crate::entities::payout_request::PayoutMethod,
        crate::entities::ledger_entry::Model,
        crate::entities::ledger_entry::LedgerTransactionType,
        crate::ResponseMeta,
        crate::errors::ErrorResponse,
    ))
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
