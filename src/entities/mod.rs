pub mod cart_session;
pub mod gateway_log;
pub mod ledger_entry;
pub mod message_log;
pub mod order;
pub mod order_item;
pub mod outbox_task;
pub mod payment_transaction;
pub mod payout_request;
pub mod platform_wallet;
pub mod product;
pub mod store_balance;

pub use cart_session::Entity as CartSession;
pub use gateway_log::Entity as GatewayLog;
pub use ledger_entry::Entity as LedgerEntry;
pub use message_log::Entity as MessageLog;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use outbox_task::Entity as OutboxTask;
pub use payment_transaction::Entity as PaymentTransaction;
pub use payout_request::Entity as PayoutRequest;
pub use platform_wallet::Entity as PlatformWallet;
pub use product::Entity as Product;
pub use store_balance::Entity as StoreBalance;
