pub mod common;
pub mod finance;
pub mod payments;
pub mod payouts;
pub mod webhooks;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateway::SettlementGateway;
use crate::messaging::MessageSender;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
/// and the background workers.
#[derive(Clone)]
pub struct AppServices {
    pub payments: Arc<crate::services::PaymentService>,
    pub payouts: Arc<crate::services::PayoutService>,
    pub ledger: Arc<crate::services::LedgerService>,
    pub finance: Arc<crate::services::FinanceService>,
    pub conversation: Arc<crate::services::ConversationService>,
    pub wallets: Arc<crate::services::WalletService>,
    pub orders: Arc<crate::services::OrderService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn SettlementGateway>,
        messaging: Arc<dyn MessageSender>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        let ledger = Arc::new(crate::services::LedgerService::new(db.clone()));
        let wallets = Arc::new(crate::services::WalletService::new(db.clone()));
        let orders = Arc::new(crate::services::OrderService::new(db.clone()));

        let payments = Arc::new(crate::services::PaymentService::new(
            db.clone(),
            gateway.clone(),
            ledger.clone(),
            wallets.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let payouts = Arc::new(crate::services::PayoutService::new(
            db.clone(),
            gateway,
            ledger.clone(),
            wallets.clone(),
            event_sender.clone(),
            config,
        ));
        let finance = Arc::new(crate::services::FinanceService::new(
            db.clone(),
            ledger.clone(),
        ));
        let conversation = Arc::new(crate::services::ConversationService::new(
            db,
            messaging,
            payments.clone(),
            orders.clone(),
            event_sender,
        ));

        Self {
            payments,
            payouts,
            ledger,
            finance,
            conversation,
            wallets,
            orders,
        }
    }
}
