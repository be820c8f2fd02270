//! Conversational commerce engine: interprets inbound channel messages as
//! cart commands and replies through the messaging provider.
//!
//! Inbound events are logged before interpretation. The unique
//! `provider_message_id` column makes webhook replays no-ops: a duplicate
//! insert loses the unique-constraint race and the handler returns without
//! touching the cart. Reply delivery is best-effort; a provider outage must
//! not fail the webhook.

use crate::{
    entities::{
        cart_session::{self, total_of, CartItemSnapshot, CartStatus},
        message_log::{self, DeliveryStatus, MessageDirection},
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    messaging::{MenuOption, MessageSender},
    services::{
        orders::OrderService,
        payments::{InitiatePaymentRequest, PaymentService},
    },
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Inbound message extracted from a provider webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub provider_message_id: String,
    pub from_phone: String,
    pub text: String,
}

/// What the engine did with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// Message was interpreted and this reply was sent (or attempted).
    Replied(String),
    /// Provider redelivered a message we already processed.
    Duplicate,
}

/// Parsed customer intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// "add 2 coffee". Sets the line quantity rather than incrementing, so
    /// a redelivered or repeated command converges instead of doubling.
    Add { query: String, quantity: i32 },
    Remove { query: String },
    View,
    Clear,
    Checkout,
    Help,
}

pub fn parse_command(text: &str) -> Command {
    let lowered = text.trim().to_lowercase();
    let mut tokens = lowered.split_whitespace();

    match tokens.next() {
        Some("add") | Some("buy") => {
            let rest: Vec<&str> = tokens.collect();
            if rest.is_empty() {
                return Command::Help;
            }
            match rest[0].parse::<i32>() {
                Ok(q) if q > 0 && rest.len() > 1 => Command::Add {
                    query: rest[1..].join(" "),
                    quantity: q,
                },
                Ok(_) => Command::Help,
                Err(_) => Command::Add {
                    query: rest.join(" "),
                    quantity: 1,
                },
            }
        }
        Some("remove") | Some("delete") => {
            let rest: Vec<&str> = tokens.collect();
            if rest.is_empty() {
                Command::Help
            } else {
                Command::Remove {
                    query: rest.join(" "),
                }
            }
        }
        Some("cart") | Some("view") => Command::View,
        Some("clear") | Some("empty") => Command::Clear,
        Some("checkout") | Some("pay") => Command::Checkout,
        _ => Command::Help,
    }
}

pub struct ConversationService {
    db: Arc<DatabaseConnection>,
    messaging: Arc<dyn MessageSender>,
    payments: Arc<PaymentService>,
    orders: Arc<OrderService>,
    event_sender: Arc<EventSender>,
}

impl ConversationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        messaging: Arc<dyn MessageSender>,
        payments: Arc<PaymentService>,
        orders: Arc<OrderService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            messaging,
            payments,
            orders,
            event_sender,
        }
    }

    /// Process one inbound message end to end: dedup, interpret, mutate the
    /// cart, reply.
    #[instrument(skip(self, message), fields(store_id = %store_id, from = %message.from_phone))]
    pub async fn handle_inbound(
        &self,
        store_id: Uuid,
        message: InboundMessage,
    ) -> Result<ConversationOutcome, ServiceError> {
        if !self.log_inbound(store_id, &message).await? {
            info!(provider_message_id = %message.provider_message_id, "duplicate delivery ignored");
            return Ok(ConversationOutcome::Duplicate);
        }

        let command = parse_command(&message.text);
        // Help goes out as an interactive menu; its button ids come back
        // through the webhook as plain commands.
        let menu = if command == Command::Help {
            help_menu()
        } else {
            Vec::new()
        };
        let reply = self
            .apply_command(store_id, &message.from_phone, command)
            .await?;

        self.reply(store_id, &message.from_phone, &reply, &menu).await;
        Ok(ConversationOutcome::Replied(reply))
    }

    async fn apply_command(
        &self,
        store_id: Uuid,
        phone: &str,
        command: Command,
    ) -> Result<String, ServiceError> {
        match command {
            Command::Add { query, quantity } => self.add_item(store_id, phone, &query, quantity).await,
            Command::Remove { query } => self.remove_item(store_id, phone, &query).await,
            Command::View => {
                let cart = self.active_cart(store_id, phone).await?;
                Ok(match cart {
                    Some(cart) => render_cart(&cart)?,
                    None => "Your cart is empty.".to_string(),
                })
            }
            Command::Clear => {
                if let Some(cart) = self.active_cart(store_id, phone).await? {
                    self.save_items(&cart, Vec::new()).await?;
                }
                Ok("Cart cleared.".to_string())
            }
            Command::Checkout => self.checkout(store_id, phone).await,
            Command::Help => Ok(concat!(
                "Commands:\n",
                "  add <qty> <product> - add to cart\n",
                "  remove <product> - remove from cart\n",
                "  cart - view cart\n",
                "  clear - empty cart\n",
                "  checkout - pay for your order"
            )
            .to_string()),
        }
    }

    async fn add_item(
        &self,
        store_id: Uuid,
        phone: &str,
        query: &str,
        quantity: i32,
    ) -> Result<String, ServiceError> {
        let found = product::Entity::find()
            .filter(product::Column::StoreId.eq(store_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Name.contains(query))
            .one(&*self.db)
            .await?;

        let Some(item) = found else {
            return Ok(format!("Sorry, no product matching \"{}\" was found.", query));
        };

        let cart = self
            .get_or_create_cart(store_id, phone, &item.currency)
            .await?;
        let mut items = cart.item_snapshots()?;

        match items.iter_mut().find(|i| i.product_id == item.id) {
            Some(existing) => existing.quantity = quantity,
            None => items.push(CartItemSnapshot {
                product_id: item.id,
                name: item.name.clone(),
                price: item.price,
                quantity,
            }),
        }
        let updated = self.save_items(&cart, items).await?;

        Ok(format!(
            "Added {} x {}.\n{}",
            quantity,
            item.name,
            render_cart(&updated)?
        ))
    }

    async fn remove_item(
        &self,
        store_id: Uuid,
        phone: &str,
        query: &str,
    ) -> Result<String, ServiceError> {
        let Some(cart) = self.active_cart(store_id, phone).await? else {
            return Ok("Your cart is empty.".to_string());
        };

        let items = cart.item_snapshots()?;
        let lowered = query.to_lowercase();
        let (kept, dropped): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|i| !i.name.to_lowercase().contains(&lowered));

        if dropped.is_empty() {
            return Ok(format!("\"{}\" is not in your cart.", query));
        }
        let updated = self.save_items(&cart, kept).await?;
        Ok(format!(
            "Removed {}.\n{}",
            dropped
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            render_cart(&updated)?
        ))
    }

    /// Convert the active cart into an order and trigger the payment push.
    async fn checkout(&self, store_id: Uuid, phone: &str) -> Result<String, ServiceError> {
        let Some(cart) = self.active_cart(store_id, phone).await? else {
            return Ok("Your cart is empty. Add something before checking out.".to_string());
        };
        let items = cart.item_snapshots()?;
        if items.is_empty() {
            return Ok("Your cart is empty. Add something before checking out.".to_string());
        }

        let order = self
            .orders
            .create_from_cart(store_id, phone, &items, cart.total, &cart.currency)
            .await?;

        cart_session::ActiveModel {
            id: Set(cart.id),
            status: Set(CartStatus::CheckedOut),
            last_activity_at: Set(Utc::now()),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CartCheckedOut {
                cart_id: cart.id,
                order_id: order.id,
                store_id,
            })
            .await;

        let initiation = self
            .payments
            .initiate_customer_payment(InitiatePaymentRequest {
                store_id,
                order_id: Some(order.id),
                amount: order.total,
                currency: order.currency.clone(),
                customer_phone: phone.to_string(),
                customer_email: None,
            })
            .await?;

        if initiation.push_initiated {
            Ok(format!(
                "Order {} placed for {} {}. Check your phone to approve the payment.",
                order.order_number, order.total, order.currency
            ))
        } else {
            Ok(format!(
                "Order {} was placed but the payment could not be started. Reply \"pay\" to try again.",
                order.order_number
            ))
        }
    }

    async fn active_cart(
        &self,
        store_id: Uuid,
        phone: &str,
    ) -> Result<Option<cart_session::Model>, ServiceError> {
        Ok(cart_session::Entity::find()
            .filter(cart_session::Column::StoreId.eq(store_id))
            .filter(cart_session::Column::CustomerPhone.eq(phone))
            .filter(cart_session::Column::Status.eq(CartStatus::Active))
            .one(&*self.db)
            .await?)
    }

    async fn get_or_create_cart(
        &self,
        store_id: Uuid,
        phone: &str,
        currency: &str,
    ) -> Result<cart_session::Model, ServiceError> {
        if let Some(cart) = self.active_cart(store_id, phone).await? {
            return Ok(cart);
        }
        let now = Utc::now();
        let created = cart_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            customer_phone: Set(phone.to_string()),
            items: Set(serde_json::json!([])),
            total: Set(rust_decimal::Decimal::ZERO),
            currency: Set(currency.to_string()),
            status: Set(CartStatus::Active),
            last_activity_at: Set(now),
            reminder_sent_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;
        Ok(created)
    }

    /// Persist new item snapshots and recompute the total. Activity resets
    /// the reminder clock.
    async fn save_items(
        &self,
        cart: &cart_session::Model,
        items: Vec<CartItemSnapshot>,
    ) -> Result<cart_session::Model, ServiceError> {
        let total = total_of(&items);
        let now = Utc::now();
        let updated = cart_session::ActiveModel {
            id: Set(cart.id),
            items: Set(serde_json::to_value(&items)?),
            total: Set(total),
            last_activity_at: Set(now),
            reminder_sent_at: Set(None),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;
        Ok(updated)
    }

    /// Insert the inbound log row. Returns false when the provider message
    /// id was already recorded (webhook replay).
    async fn log_inbound(
        &self,
        store_id: Uuid,
        message: &InboundMessage,
    ) -> Result<bool, ServiceError> {
        let result = message_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            provider_message_id: Set(Some(message.provider_message_id.clone())),
            direction: Set(MessageDirection::Inbound),
            customer_phone: Set(message.from_phone.clone()),
            payload: Set(serde_json::json!({ "text": message.text })),
            delivery_status: Set(DeliveryStatus::Received),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send and log the outbound reply. Delivery failure is logged, never
    /// propagated.
    async fn reply(&self, store_id: Uuid, phone: &str, body: &str, options: &[MenuOption]) {
        let delivery = if options.is_empty() {
            self.messaging.send_text(phone, body).await
        } else {
            self.messaging.send_menu(phone, body, options).await
        };
        let (provider_id, status) = match delivery {
            Ok(id) => (if id.is_empty() { None } else { Some(id) }, DeliveryStatus::Sent),
            Err(e) => {
                warn!(error = %e, "failed to deliver reply");
                (None, DeliveryStatus::Failed)
            }
        };

        let logged = message_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            provider_message_id: Set(provider_id),
            direction: Set(MessageDirection::Outbound),
            customer_phone: Set(phone.to_string()),
            payload: Set(serde_json::json!({ "text": body })),
            delivery_status: Set(status),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await;
        if let Err(e) = logged {
            warn!(error = %e, "failed to log outbound message");
        }
    }

}

fn help_menu() -> Vec<MenuOption> {
    vec![
        MenuOption {
            id: "cart".to_string(),
            title: "View cart".to_string(),
        },
        MenuOption {
            id: "checkout".to_string(),
            title: "Checkout".to_string(),
        },
    ]
}

fn render_cart(cart: &cart_session::Model) -> Result<String, ServiceError> {
    let items = cart.item_snapshots()?;
    if items.is_empty() {
        return Ok("Your cart is empty.".to_string());
    }
    let mut lines: Vec<String> = items
        .iter()
        .map(|i| format!("{} x {} - {} {}", i.quantity, i.name, i.line_total(), cart.currency))
        .collect();
    lines.push(format!("Total: {} {}", cart.total, cart.currency));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_with_quantity() {
        assert_eq!(
            parse_command("add 2 house coffee"),
            Command::Add {
                query: "house coffee".to_string(),
                quantity: 2
            }
        );
    }

    #[test]
    fn add_defaults_to_one() {
        assert_eq!(
            parse_command("ADD coffee"),
            Command::Add {
                query: "coffee".to_string(),
                quantity: 1
            }
        );
    }

    #[test]
    fn bare_or_zero_quantity_add_is_help() {
        assert_eq!(parse_command("add"), Command::Help);
        assert_eq!(parse_command("add 0 coffee"), Command::Help);
        assert_eq!(parse_command("add 3"), Command::Help);
    }

    #[test]
    fn remove_view_clear_checkout() {
        assert_eq!(
            parse_command("remove coffee"),
            Command::Remove {
                query: "coffee".to_string()
            }
        );
        assert_eq!(parse_command("cart"), Command::View);
        assert_eq!(parse_command("  Clear "), Command::Clear);
        assert_eq!(parse_command("checkout"), Command::Checkout);
        assert_eq!(parse_command("pay"), Command::Checkout);
    }

    #[test]
    fn unknown_text_gets_help() {
        assert_eq!(parse_command("hello there"), Command::Help);
        assert_eq!(parse_command(""), Command::Help);
    }
}
