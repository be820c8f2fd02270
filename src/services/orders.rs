//! Thin order creation for conversational checkout. The storefront layer
//! owns order fulfilment; the settlement core only needs a charge target.

use crate::{
    entities::{
        cart_session::CartItemSnapshot,
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Materialize a cart into an order awaiting payment. Item name and
    /// price come from the cart snapshots, not the live catalog.
    #[instrument(skip(self, items))]
    pub async fn create_from_cart(
        &self,
        store_id: Uuid,
        customer_phone: &str,
        items: &[CartItemSnapshot],
        total: Decimal,
        currency: &str,
    ) -> Result<order::Model, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "cannot create an order from an empty cart".to_string(),
            ));
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let created = order::ActiveModel {
            id: Set(order_id),
            store_id: Set(store_id),
            order_number: Set(order_number(order_id)),
            customer_phone: Set(customer_phone.to_string()),
            total: Set(total),
            currency: Set(currency.to_string()),
            status: Set(OrderStatus::PendingPayment),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        for item in items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                name: Set(item.name.clone()),
                price: Set(item.price),
                quantity: Set(item.quantity),
                created_at: Set(now),
            }
            .insert(&*self.db)
            .await?;
        }

        info!(order_id = %created.id, order_number = %created.order_number, "order created");
        Ok(created)
    }
}

fn order_number(order_id: Uuid) -> String {
    format!(
        "ORD-{}",
        order_id.simple().to_string()[..8].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_are_prefixed_and_short() {
        let n = order_number(Uuid::new_v4());
        assert!(n.starts_with("ORD-"));
        assert_eq!(n.len(), 12);
        assert_eq!(n, n.to_uppercase());
    }
}
