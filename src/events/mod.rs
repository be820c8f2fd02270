use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the settlement engine. Consumers (metrics,
/// storefront realtime updates) subscribe through the processor task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PaymentInitiated {
        payment_id: Uuid,
        store_id: Uuid,
        amount: Decimal,
        currency: String,
    },
    PaymentCompleted {
        payment_id: Uuid,
        store_id: Uuid,
        amount_credited: Decimal,
    },
    PaymentFailed {
        payment_id: Uuid,
        store_id: Uuid,
        reason: String,
    },
    PaymentRefunded {
        payment_id: Uuid,
        store_id: Uuid,
    },
    PayoutApproved {
        payout_id: Uuid,
        store_id: Uuid,
        amount: Decimal,
    },
    PayoutCompleted {
        payout_id: Uuid,
        store_id: Uuid,
        amount: Decimal,
    },
    PayoutFailed {
        payout_id: Uuid,
        store_id: Uuid,
        reason: String,
    },
    PayoutCancelled {
        payout_id: Uuid,
        store_id: Uuid,
    },
    CartCheckedOut {
        cart_id: Uuid,
        order_id: Uuid,
        store_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Send an event, logging instead of failing when the channel is closed.
    /// Event delivery is advisory; it must never fail a financial mutation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "failed to publish domain event");
        }
    }
}

/// Background task draining the event channel. Currently logs each event;
/// this is the integration point for realtime storefront notifications.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "domain event");
    }
    info!("event channel closed; processor exiting");
}
