//! Shared test harness: in-memory SQLite with migrations applied, a scripted
//! fake settlement gateway, and a recording message sender.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pesaflow_api::{
    config::AppConfig,
    db,
    entities::{platform_wallet, product, store_balance},
    errors::ServiceError,
    events::EventSender,
    gateway::{
        DepositReceipt, DepositRequest, DisputeTicket, DisputeTicketRequest, GatewayError,
        GatewayTxStatus, OfframpReceipt, OfframpRequest, OnrampReceipt, OnrampRequest, Quote,
        QuoteRequest, SettlementGateway, TxStatusReport,
    },
    handlers::AppServices,
    messaging::{MenuOption, MessageSender, ProviderMessageId},
    migrator::Migrator,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Mutable script controlling what the fake gateway returns.
pub struct GatewayScript {
    pub quote_error: Option<GatewayError>,
    pub exchange_rate: Decimal,
    pub onramp_error: Option<GatewayError>,
    pub onramp_receipt_status: GatewayTxStatus,
    pub onramp_status: GatewayTxStatus,
    pub onramp_status_error: Option<GatewayError>,
    pub deposit_success: bool,
    pub deposit_tx_hash: String,
    pub deposit_error: Option<GatewayError>,
    pub offramp_error: Option<GatewayError>,
    pub offramp_receipt_status: GatewayTxStatus,
    pub offramp_status: GatewayTxStatus,
    pub offramp_status_error: Option<GatewayError>,
}

impl Default for GatewayScript {
    fn default() -> Self {
        Self {
            quote_error: None,
            exchange_rate: dec!(0.0077),
            onramp_error: None,
            onramp_receipt_status: GatewayTxStatus::Pending,
            onramp_status: GatewayTxStatus::Pending,
            onramp_status_error: None,
            deposit_success: true,
            deposit_tx_hash: "0xabc".to_string(),
            deposit_error: None,
            offramp_error: None,
            offramp_receipt_status: GatewayTxStatus::Pending,
            offramp_status: GatewayTxStatus::Success,
            offramp_status_error: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct GatewayCounters {
    pub quotes: usize,
    pub onramps: usize,
    pub onramp_checks: usize,
    pub deposits: usize,
    pub offramps: usize,
    pub offramp_checks: usize,
    pub disputes: usize,
}

pub struct FakeGateway {
    pub script: Mutex<GatewayScript>,
    pub counters: Mutex<GatewayCounters>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(GatewayScript::default()),
            counters: Mutex::new(GatewayCounters::default()),
        }
    }

    pub fn configure(&self, f: impl FnOnce(&mut GatewayScript)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn counters(&self) -> GatewayCounters {
        self.counters.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementGateway for FakeGateway {
    async fn get_quote(&self, request: QuoteRequest) -> Result<Quote, GatewayError> {
        self.counters.lock().unwrap().quotes += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.quote_error {
            return Err(e.clone());
        }
        Ok(Quote {
            id: format!("Q-{}", Uuid::new_v4().simple()),
            exchange_rate: script.exchange_rate,
            crypto_amount: request.amount_fiat * script.exchange_rate,
            fees: Decimal::ZERO,
            expires_at: None,
        })
    }

    async fn initiate_onramp(
        &self,
        _request: OnrampRequest,
    ) -> Result<OnrampReceipt, GatewayError> {
        self.counters.lock().unwrap().onramps += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.onramp_error {
            return Err(e.clone());
        }
        Ok(OnrampReceipt {
            order_id: format!("RAMP-{}", Uuid::new_v4().simple()),
            status: script.onramp_receipt_status,
            tx_hash: None,
        })
    }

    async fn check_onramp_status(&self, _order_id: &str) -> Result<TxStatusReport, GatewayError> {
        self.counters.lock().unwrap().onramp_checks += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.onramp_status_error {
            return Err(e.clone());
        }
        Ok(TxStatusReport {
            status: script.onramp_status,
            amount: None,
            tx_hash: None,
            message: None,
        })
    }

    async fn process_deposit(
        &self,
        _request: DepositRequest,
    ) -> Result<DepositReceipt, GatewayError> {
        self.counters.lock().unwrap().deposits += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.deposit_error {
            return Err(e.clone());
        }
        Ok(DepositReceipt {
            success: script.deposit_success,
            tx_hash: script
                .deposit_success
                .then(|| script.deposit_tx_hash.clone()),
        })
    }

    async fn initiate_offramp(
        &self,
        _request: OfframpRequest,
    ) -> Result<OfframpReceipt, GatewayError> {
        self.counters.lock().unwrap().offramps += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.offramp_error {
            return Err(e.clone());
        }
        Ok(OfframpReceipt {
            order_id: format!("OFF-{}", Uuid::new_v4().simple()),
            status: script.offramp_receipt_status,
        })
    }

    async fn check_offramp_status(&self, _order_id: &str) -> Result<TxStatusReport, GatewayError> {
        self.counters.lock().unwrap().offramp_checks += 1;
        let script = self.script.lock().unwrap();
        if let Some(e) = &script.offramp_status_error {
            return Err(e.clone());
        }
        Ok(TxStatusReport {
            status: script.offramp_status,
            amount: None,
            tx_hash: None,
            message: None,
        })
    }

    async fn create_dispute_ticket(
        &self,
        _request: DisputeTicketRequest,
    ) -> Result<DisputeTicket, GatewayError> {
        self.counters.lock().unwrap().disputes += 1;
        Ok(DisputeTicket {
            ticket_id: format!("T-{}", Uuid::new_v4().simple()),
        })
    }
}

/// Message sender that records every outbound message.
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub menus: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            menus: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_message_to(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, body)| body.clone())
    }

    /// Option ids of the most recent menu sent to `phone`.
    pub fn last_menu_to(&self, phone: &str) -> Option<Vec<String>> {
        self.menus
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, ids)| ids.clone())
    }
}

#[async_trait]
impl MessageSender for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<ProviderMessageId, ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(format!("out-{}", Uuid::new_v4().simple()))
    }

    async fn send_menu(
        &self,
        to: &str,
        body: &str,
        options: &[MenuOption],
    ) -> Result<ProviderMessageId, ServiceError> {
        self.menus.lock().unwrap().push((
            to.to_string(),
            options.iter().map(|o| o.id.clone()).collect(),
        ));
        self.send_text(to, body).await
    }
}

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub gateway: Arc<FakeGateway>,
    pub messenger: Arc<RecordingMessenger>,
    pub event_sender: EventSender,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        customize(&mut config);

        // One connection keeps every query on the same in-memory database.
        let db_config = db::DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("test database");
        Migrator::up(&pool, None).await.expect("migrations");

        let db = Arc::new(pool);
        let config = Arc::new(config);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(pesaflow_api::events::process_events(event_rx));

        let gateway = Arc::new(FakeGateway::new());
        let messenger = Arc::new(RecordingMessenger::new());

        let services = AppServices::new(
            db.clone(),
            gateway.clone(),
            messenger.clone(),
            Arc::new(event_sender.clone()),
            config.clone(),
        );

        Self {
            db,
            config,
            services,
            gateway,
            messenger,
            event_sender,
        }
    }

    /// Seed an active platform wallet on the default network/currency pair.
    pub async fn seed_wallet(&self) -> platform_wallet::Model {
        let now = Utc::now();
        platform_wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            address: Set(format!("0x{}", Uuid::new_v4().simple())),
            network: Set(self.config.gateway.network.clone()),
            currency: Set(self.config.gateway.crypto_currency.clone()),
            is_active: Set(true),
            in_maintenance: Set(false),
            daily_tx_count: Set(0),
            daily_tx_limit: Set(1000),
            daily_volume: Set(Decimal::ZERO),
            daily_volume_limit: Set(dec!(1000000)),
            last_used_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("seed wallet")
    }

    /// Seed a store balance with available funds.
    pub async fn seed_balance(&self, store_id: Uuid, available: Decimal) -> store_balance::Model {
        store_balance::ActiveModel {
            store_id: Set(store_id),
            available: Set(available),
            reserved: Set(Decimal::ZERO),
            lifetime_earnings: Set(available),
            currency: Set("KES".to_string()),
            minimum_payout_amount: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("seed balance")
    }

    pub async fn seed_product(
        &self,
        store_id: Uuid,
        name: &str,
        price: Decimal,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            name: Set(name.to_string()),
            price: Set(price),
            currency: Set("KES".to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }
}
