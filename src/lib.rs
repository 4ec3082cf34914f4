pub mod address;
pub mod api;
pub mod chains;
pub mod config;
pub mod db;
pub mod enums;
pub mod error;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod services;

pub use config::Config;
pub use enums::{ Chain, CodeKind, DepositStatus, WithdrawalStatus };
pub use error::{ AppError, Result };
