pub mod wallet_address;
pub mod balance;
pub mod deposit;
pub mod withdrawal;
pub mod verification_code;
pub mod scan_watermark;

pub use wallet_address::Entity as WalletAddress;
pub use balance::Entity as Balance;
pub use deposit::Entity as Deposit;
pub use withdrawal::Entity as Withdrawal;
pub use verification_code::Entity as VerificationCode;
pub use scan_watermark::Entity as ScanWatermark;
