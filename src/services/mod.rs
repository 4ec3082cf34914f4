pub mod price_service;
pub mod ledger_service;
pub mod deposit_service;
pub mod withdrawal_service;
pub mod notification_service;
pub mod broadcast;

pub use price_service::PriceService;
pub use ledger_service::LedgerService;
pub use deposit_service::DepositService;
pub use withdrawal_service::WithdrawalService;
pub use notification_service::{ Notice, Notifier, TracingNotifier };
pub use broadcast::{ Broadcaster, HttpBroadcaster };
