mod common;

use assert_matches::assert_matches;
use common::TestApp;
use pesaflow_api::entities::ledger_entry::LedgerTransactionType;
use pesaflow_api::errors::ServiceError;
use pesaflow_api::services::ledger::ApplyEntryInput;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn sale(store_id: Uuid, amount: Decimal) -> ApplyEntryInput {
    ApplyEntryInput {
        store_id,
        amount,
        transaction_type: LedgerTransactionType::Sale,
        transaction_reference: format!("ref-{}", Uuid::new_v4().simple()),
        description: "test sale".to_string(),
        currency: "KES".to_string(),
        payment_id: None,
        payout_id: None,
    }
}

#[tokio::test]
async fn entries_chain_and_conserve_balance() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    let first = ledger.apply_entry(sale(store_id, dec!(100))).await.unwrap();
    assert_eq!(first.balance_before, dec!(0));
    assert_eq!(first.balance_after, dec!(100));

    let second = ledger.apply_entry(sale(store_id, dec!(50))).await.unwrap();
    assert_eq!(second.balance_before, dec!(100));
    assert_eq!(second.balance_after, dec!(150));

    let refund = ledger
        .apply_entry(ApplyEntryInput {
            amount: dec!(-30),
            transaction_type: LedgerTransactionType::Refund,
            ..sale(store_id, dec!(0))
        })
        .await
        .unwrap();
    assert_eq!(refund.balance_after, dec!(120));

    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(120));
    assert_eq!(balance.lifetime_earnings, dec!(150));
    assert!(ledger.verify_conservation(store_id).await.unwrap());
}

#[tokio::test]
async fn debit_beyond_available_is_rejected() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    ledger.apply_entry(sale(store_id, dec!(100))).await.unwrap();

    let result = ledger
        .apply_entry(ApplyEntryInput {
            amount: dec!(-150),
            transaction_type: LedgerTransactionType::Adjustment,
            ..sale(store_id, dec!(0))
        })
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientBalance(_)));

    // The rejected debit left no trace.
    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(100));
    assert!(ledger.verify_conservation(store_id).await.unwrap());
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let app = TestApp::new().await;
    let result = app
        .services
        .ledger
        .apply_entry(sale(Uuid::new_v4(), Decimal::ZERO))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn reserve_moves_funds_between_buckets_without_entries() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    ledger.apply_entry(sale(store_id, dec!(1000))).await.unwrap();
    ledger.reserve(store_id, dec!(400), "KES").await.unwrap();

    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(600));
    assert_eq!(balance.reserved, dec!(400));
    // Total is unchanged, so the entry chain still matches.
    assert!(ledger.verify_conservation(store_id).await.unwrap());

    ledger.release(store_id, dec!(400)).await.unwrap();
    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(1000));
    assert_eq!(balance.reserved, dec!(0));
}

#[tokio::test]
async fn reserve_beyond_available_is_rejected() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    ledger.apply_entry(sale(store_id, dec!(500))).await.unwrap();
    let result = ledger.reserve(store_id, dec!(600), "KES").await;
    assert_matches!(result, Err(ServiceError::InsufficientBalance(_)));
}

#[tokio::test]
async fn releasing_more_than_reserved_is_a_conflict() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    ledger.apply_entry(sale(store_id, dec!(500))).await.unwrap();
    ledger.reserve(store_id, dec!(200), "KES").await.unwrap();
    ledger.release(store_id, dec!(200)).await.unwrap();

    // A second release of the same reservation must not mint money.
    let result = ledger.release(store_id, dec!(200)).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(500));
}

#[tokio::test]
async fn concurrent_credits_serialize_per_store() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = app.services.ledger.clone();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.apply_entry(sale(store_id, dec!(10))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(100));
    // Every entry chained off the previous one; no lost updates.
    assert!(ledger.verify_conservation(store_id).await.unwrap());
}

#[tokio::test]
async fn payout_entries_debit_the_reserved_bucket() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    let ledger = &app.services.ledger;

    ledger.apply_entry(sale(store_id, dec!(1000))).await.unwrap();
    ledger.reserve(store_id, dec!(300), "KES").await.unwrap();

    ledger
        .apply_entry(ApplyEntryInput {
            amount: dec!(-300),
            transaction_type: LedgerTransactionType::Payout,
            ..sale(store_id, dec!(0))
        })
        .await
        .unwrap();

    let balance = ledger.balance(store_id).await.unwrap().unwrap();
    assert_eq!(balance.available, dec!(700));
    assert_eq!(balance.reserved, dec!(0));
    assert!(ledger.verify_conservation(store_id).await.unwrap());
}
