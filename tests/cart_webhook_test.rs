mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;
use hmac::{Hmac, Mac};
use pesaflow_api::entities::cart_session::{self, CartStatus};
use pesaflow_api::entities::message_log::{self, MessageDirection};
use pesaflow_api::entities::{order, payment_transaction};
use pesaflow_api::services::conversation::{ConversationOutcome, InboundMessage};
use pesaflow_api::workers::run_cart_sweep_once;
use pesaflow_api::{app_router, AppState};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

const PHONE: &str = "254712345678";

fn inbound(text: &str) -> InboundMessage {
    InboundMessage {
        provider_message_id: format!("wamid.{}", Uuid::new_v4().simple()),
        from_phone: PHONE.to_string(),
        text: text.to_string(),
    }
}

async fn active_cart(app: &TestApp, store_id: Uuid) -> Option<cart_session::Model> {
    cart_session::Entity::find()
        .filter(cart_session::Column::StoreId.eq(store_id))
        .filter(cart_session::Column::CustomerPhone.eq(PHONE))
        .filter(cart_session::Column::Status.eq(CartStatus::Active))
        .one(&*app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn add_sets_the_line_quantity_instead_of_incrementing() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;

    app.services
        .conversation
        .handle_inbound(store_id, inbound("add coffee"))
        .await
        .unwrap();
    app.services
        .conversation
        .handle_inbound(store_id, inbound("add 3 coffee"))
        .await
        .unwrap();

    let cart = active_cart(&app, store_id).await.unwrap();
    let items = cart.item_snapshots().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3, "repeated add must set, not accumulate");
    assert_eq!(cart.total, dec!(750));

    // Every inbound message got a reply.
    let reply = app.messenger.last_message_to(PHONE).unwrap();
    assert!(reply.contains("3 x House Coffee"));
    assert!(reply.contains("Total: 750 KES"));
}

#[tokio::test]
async fn remove_and_clear_empty_the_cart() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;
    app.seed_product(store_id, "Chai Latte", dec!(180)).await;

    app.services
        .conversation
        .handle_inbound(store_id, inbound("add 2 coffee"))
        .await
        .unwrap();
    app.services
        .conversation
        .handle_inbound(store_id, inbound("add chai"))
        .await
        .unwrap();

    let outcome = app
        .services
        .conversation
        .handle_inbound(store_id, inbound("remove chai"))
        .await
        .unwrap();
    let ConversationOutcome::Replied(reply) = outcome else {
        panic!("expected a reply");
    };
    assert!(reply.contains("Removed Chai Latte"));

    let cart = active_cart(&app, store_id).await.unwrap();
    assert_eq!(cart.item_snapshots().unwrap().len(), 1);
    assert_eq!(cart.total, dec!(500));

    app.services
        .conversation
        .handle_inbound(store_id, inbound("clear"))
        .await
        .unwrap();
    let cart = active_cart(&app, store_id).await.unwrap();
    assert!(cart.item_snapshots().unwrap().is_empty());
    assert_eq!(cart.total, dec!(0));
}

#[tokio::test]
async fn unmatched_product_and_unknown_text_reply_without_a_cart() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();

    let outcome = app
        .services
        .conversation
        .handle_inbound(store_id, inbound("add unicorn"))
        .await
        .unwrap();
    assert_matches::assert_matches!(
        outcome,
        ConversationOutcome::Replied(reply) if reply.contains("no product matching")
    );
    assert!(active_cart(&app, store_id).await.is_none());

    let outcome = app
        .services
        .conversation
        .handle_inbound(store_id, inbound("hello there"))
        .await
        .unwrap();
    assert_matches::assert_matches!(
        outcome,
        ConversationOutcome::Replied(reply) if reply.contains("Commands:")
    );
}

#[tokio::test]
async fn help_goes_out_as_an_interactive_menu() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();

    app.services
        .conversation
        .handle_inbound(store_id, inbound("hello there"))
        .await
        .unwrap();

    // The menu button ids are commands the webhook parser understands.
    let options = app.messenger.last_menu_to(PHONE).unwrap();
    assert_eq!(options, vec!["cart".to_string(), "checkout".to_string()]);

    // Cart replies stay plain text.
    app.services
        .conversation
        .handle_inbound(store_id, inbound("cart"))
        .await
        .unwrap();
    assert_eq!(app.messenger.menus.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn redelivered_message_is_a_no_op() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;

    let message = inbound("add 2 coffee");
    let first = app
        .services
        .conversation
        .handle_inbound(store_id, message.clone())
        .await
        .unwrap();
    assert_matches::assert_matches!(first, ConversationOutcome::Replied(_));

    let replay = app
        .services
        .conversation
        .handle_inbound(store_id, message)
        .await
        .unwrap();
    assert_eq!(replay, ConversationOutcome::Duplicate);

    let cart = active_cart(&app, store_id).await.unwrap();
    assert_eq!(cart.item_snapshots().unwrap()[0].quantity, 2);

    // The replay was never logged a second time and never answered.
    let inbound_logs = message_log::Entity::find()
        .filter(message_log::Column::Direction.eq(MessageDirection::Inbound))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(inbound_logs.len(), 1);
    assert_eq!(app.messenger.messages().len(), 1);
}

#[tokio::test]
async fn checkout_creates_an_order_and_starts_the_payment() {
    let app = TestApp::new().await;
    app.seed_wallet().await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;

    app.services
        .conversation
        .handle_inbound(store_id, inbound("add 2 coffee"))
        .await
        .unwrap();
    let outcome = app
        .services
        .conversation
        .handle_inbound(store_id, inbound("checkout"))
        .await
        .unwrap();
    let ConversationOutcome::Replied(reply) = outcome else {
        panic!("expected a reply");
    };
    assert!(reply.contains("Order ORD-"));
    assert!(reply.contains("Check your phone"));

    let placed = order::Entity::find()
        .filter(order::Column::StoreId.eq(store_id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placed.total, dec!(500));
    assert_eq!(placed.status, order::OrderStatus::PendingPayment);

    // The cart is consumed and the STK push went out.
    assert!(active_cart(&app, store_id).await.is_none());
    assert_eq!(app.gateway.counters().onramps, 1);

    let payment = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::OrderId.eq(placed.id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.amount_fiat, dec!(500));
}

#[tokio::test]
async fn checkout_of_an_empty_cart_is_refused() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();

    let outcome = app
        .services
        .conversation
        .handle_inbound(store_id, inbound("checkout"))
        .await
        .unwrap();
    assert_matches::assert_matches!(
        outcome,
        ConversationOutcome::Replied(reply) if reply.contains("cart is empty")
    );
    assert_eq!(app.gateway.counters().onramps, 0);
}

#[tokio::test]
async fn idle_carts_get_one_reminder_and_eventually_expire() {
    let app = TestApp::new().await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;

    app.services
        .conversation
        .handle_inbound(store_id, inbound("add coffee"))
        .await
        .unwrap();
    let cart = active_cart(&app, store_id).await.unwrap();
    let replies_before = app.messenger.messages().len();

    // Idle past the reminder window but inside the expiry window.
    backdate(&app, cart.id, 2 * 60 * 60).await;
    run_cart_sweep_once(&app.db, &*app.messenger, &app.config)
        .await
        .unwrap();

    let reminded = app.messenger.last_message_to(PHONE).unwrap();
    assert!(reminded.contains("left 1 item(s)"));
    let cart = active_cart(&app, store_id).await.unwrap();
    assert!(cart.reminder_sent_at.is_some());

    // A second sweep must not remind again.
    backdate(&app, cart.id, 2 * 60 * 60).await;
    run_cart_sweep_once(&app.db, &*app.messenger, &app.config)
        .await
        .unwrap();
    assert_eq!(app.messenger.messages().len(), replies_before + 1);

    // Idle past the expiry window.
    backdate(&app, cart.id, 8 * 24 * 60 * 60).await;
    run_cart_sweep_once(&app.db, &*app.messenger, &app.config)
        .await
        .unwrap();
    assert!(active_cart(&app, store_id).await.is_none());
    let expired = cart_session::Entity::find_by_id(cart.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, CartStatus::Expired);
}

async fn backdate(app: &TestApp, cart_id: Uuid, seconds: i64) {
    cart_session::ActiveModel {
        id: Set(cart_id),
        last_activity_at: Set(chrono::Utc::now() - chrono::Duration::seconds(seconds)),
        ..Default::default()
    }
    .update(&*app.db)
    .await
    .unwrap();
}

fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn signed_webhook_drives_the_cart_end_to_end() {
    let secret = "hook-secret";
    let app = TestApp::with_config(|cfg| {
        cfg.messaging.webhook_secret = Some(secret.to_string());
    })
    .await;
    let store_id = Uuid::new_v4();
    app.seed_product(store_id, "House Coffee", dec!(250)).await;

    let state = AppState {
        db: app.db.clone(),
        config: app.config.clone(),
        event_sender: app.event_sender.clone(),
        services: app.services.clone(),
    };
    let router = app_router().with_state(state);

    let body = serde_json::json!({
        "entry": [{
            "changes": [{
                "value": {
                    "messages": [
                        { "id": "wamid.hook1", "from": PHONE, "text": { "body": "add 2 coffee" } }
                    ]
                }
            }]
        }]
    })
    .to_string();
    let uri = format!("/api/v1/webhooks/messages/{}", store_id);

    // A bad signature is rejected before anything is processed.
    let forged = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "application/json")
        .header("x-hub-signature-256", sign(body.as_bytes(), "wrong-secret"))
        .body(Body::from(body.clone()))
        .unwrap();
    let response = router.clone().oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(active_cart(&app, store_id).await.is_none());

    let genuine = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "application/json")
        .header("x-hub-signature-256", sign(body.as_bytes(), secret))
        .body(Body::from(body.clone()))
        .unwrap();
    let response = router.oneshot(genuine).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cart = active_cart(&app, store_id).await.unwrap();
    let items = cart.item_snapshots().unwrap();
    assert_eq!(items[0].quantity, 2);
    assert_eq!(cart.total, dec!(500));
}
