mod common;

use assert_matches::assert_matches;
use common::TestApp;
use pesaflow_api::entities::payment_transaction::PaymentStatus;
use pesaflow_api::entities::{ledger_entry, payment_transaction};
use pesaflow_api::errors::ServiceError;
use pesaflow_api::gateway::{GatewayError, GatewayTxStatus};
use pesaflow_api::services::payments::InitiatePaymentRequest;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn payment_request(store_id: Uuid) -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        store_id,
        order_id: None,
        amount: dec!(1000),
        currency: "KES".to_string(),
        customer_phone: "254712345678".to_string(),
        customer_email: None,
    }
}

#[tokio::test]
async fn full_settlement_credits_merchant_net_of_fee() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    assert!(initiation.success);
    assert!(initiation.push_initiated);
    assert!(initiation.external_order_id.is_some());

    let payment = app
        .services
        .payments
        .get_payment(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::StkInitiated);
    assert!(payment.exchange_rate.is_some());

    // Customer approves the push; the next poll settles everything.
    app.gateway
        .configure(|s| s.onramp_status = GatewayTxStatus::Success);
    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Completed);
    assert_eq!(report.blockchain_hash.as_deref(), Some("0xabc"));

    // 1000 KES at the default 2.5% platform fee credits 975.
    let balance = app
        .services
        .ledger
        .balance(store_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.available, dec!(975));
    assert_eq!(balance.lifetime_earnings, dec!(975));
    assert!(app
        .services
        .ledger
        .verify_conservation(store_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn concurrent_polls_credit_exactly_once() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    app.gateway
        .configure(|s| s.onramp_status = GatewayTxStatus::Success);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let payments = app.services.payments.clone();
        let payment_id = initiation.payment_id;
        handles.push(tokio::spawn(async move {
            payments.check_payment_status(payment_id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries = ledger_entry::Entity::find()
        .filter(ledger_entry::Column::StoreId.eq(store_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1, "concurrent polls must credit exactly once");
    assert_eq!(entries[0].amount, dec!(975));

    let payment = app
        .services
        .payments
        .get_payment(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn deposit_failure_never_credits_and_opens_dispute() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    app.gateway.configure(|s| {
        s.onramp_status = GatewayTxStatus::Success;
        s.deposit_success = false;
    });

    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Failed);
    assert_eq!(app.gateway.counters().disputes, 1);

    // No merchant credit on a stranded deposit.
    assert!(app.services.ledger.balance(store_id).await.unwrap().is_none());
}

#[tokio::test]
async fn gateway_rejection_fails_payment_without_error() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    app.gateway
        .configure(|s| s.quote_error = Some(GatewayError::permanent("pair not supported")));

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    assert!(!initiation.success);
    assert!(!initiation.push_initiated);

    let payment = app
        .services
        .payments
        .get_payment(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.error_message.unwrap().contains("quote failed"));
    // No STK push was ever attempted.
    assert_eq!(app.gateway.counters().onramps, 0);
}

#[tokio::test]
async fn pending_polls_exhaust_the_retry_budget() {
    let app = TestApp::with_config(|cfg| cfg.payment_max_retries = 3).await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();

    // Gateway keeps reporting pending. First two polls count attempts,
    // the third exhausts the budget.
    for _ in 0..2 {
        let report = app
            .services
            .payments
            .check_payment_status(initiation.payment_id)
            .await
            .unwrap();
        assert_eq!(report.status, PaymentStatus::StkInitiated);
    }
    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Failed);

    // Terminal rows are cached; further polls hit the gateway no more.
    let checks_before = app.gateway.counters().onramp_checks;
    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Failed);
    assert_eq!(app.gateway.counters().onramp_checks, checks_before);
}

#[tokio::test]
async fn retryable_status_errors_do_not_fail_the_payment() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();

    app.gateway.configure(|s| {
        s.onramp_status_error = Some(GatewayError::retryable("gateway unreachable"))
    });
    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::StkInitiated);

    // Gateway recovers; the payment still completes.
    app.gateway.configure(|s| {
        s.onramp_status_error = None;
        s.onramp_status = GatewayTxStatus::Success;
    });
    let report = app
        .services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn refund_reverses_the_net_credit() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    app.gateway
        .configure(|s| s.onramp_status = GatewayTxStatus::Success);
    app.services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();

    let report = app
        .services
        .payments
        .mark_refunded(initiation.payment_id, Some("customer complaint".into()))
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Refunded);

    let balance = app
        .services
        .ledger
        .balance(store_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.available, dec!(0));
    assert!(app
        .services
        .ledger
        .verify_conservation(store_id)
        .await
        .unwrap());

    // Refunding twice is rejected.
    let again = app
        .services
        .payments
        .mark_refunded(initiation.payment_id, None)
        .await;
    assert_matches!(again, Err(ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn refund_with_withdrawn_funds_leaves_the_payment_completed() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();
    app.gateway
        .configure(|s| s.onramp_status = GatewayTxStatus::Success);
    app.services
        .payments
        .check_payment_status(initiation.payment_id)
        .await
        .unwrap();

    // The merchant has already moved the whole credit into a payout.
    app.services
        .ledger
        .reserve(store_id, dec!(975), "KES")
        .await
        .unwrap();

    let result = app
        .services
        .payments
        .mark_refunded(initiation.payment_id, None)
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientBalance(_)));

    // Status and ledger still agree: completed, credited, no refund entry.
    let payment = app
        .services
        .payments
        .get_payment(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    let refunds = ledger_entry::Entity::find()
        .filter(ledger_entry::Column::StoreId.eq(store_id))
        .filter(
            ledger_entry::Column::TransactionType
                .eq(ledger_entry::LedgerTransactionType::Refund),
        )
        .all(&*app.db)
        .await
        .unwrap();
    assert!(refunds.is_empty());

    // Once the funds are back, the refund goes through.
    app.services.ledger.release(store_id, dec!(975)).await.unwrap();
    let report = app
        .services
        .payments
        .mark_refunded(initiation.payment_id, None)
        .await
        .unwrap();
    assert_eq!(report.status, PaymentStatus::Refunded);
    assert!(app
        .services
        .ledger
        .verify_conservation(store_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn concurrent_pending_polls_each_count_one_attempt() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();

    let initiation = app
        .services
        .payments
        .initiate_customer_payment(payment_request(store_id))
        .await
        .unwrap();

    // Gateway stays pending; every poll must land its own attempt.
    let mut handles = Vec::new();
    for _ in 0..5 {
        let payments = app.services.payments.clone();
        let payment_id = initiation.payment_id;
        handles.push(tokio::spawn(async move {
            payments.check_payment_status(payment_id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let payment = app
        .services
        .payments
        .get_payment(initiation.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::StkInitiated);
    assert_eq!(payment.retry_count, 5, "no attempt may be lost to a race");
}

#[tokio::test]
async fn no_wallet_capacity_rejects_before_any_row() {
    let app = TestApp::new().await;
    // No wallet seeded at all.
    let result = app
        .services
        .payments
        .initiate_customer_payment(payment_request(Uuid::new_v4()))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let rows = payment_transaction::Entity::find()
        .all(&*app.db)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn unknown_payment_is_not_found() {
    let app = TestApp::new().await;
    let result = app
        .services
        .payments
        .check_payment_status(Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
