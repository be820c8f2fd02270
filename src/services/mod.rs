pub mod conversation;
pub mod finance;
pub mod ledger;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod wallets;

pub use conversation::ConversationService;
pub use finance::FinanceService;
pub use ledger::LedgerService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use payouts::PayoutService;
pub use wallets::WalletService;
