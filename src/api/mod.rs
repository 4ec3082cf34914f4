use std::sync::Arc;

pub mod balance;
pub mod deposit;
pub mod withdrawal;

use crate::db::{ DepositRepository, WithdrawalRepository };
use crate::services::{ LedgerService, WithdrawalService };

#[derive(Clone)]
pub struct AppState {
    pub ledger_service: Arc<LedgerService>,
    pub withdrawal_service: Arc<WithdrawalService>,
    pub deposits: Arc<DepositRepository>,
    pub withdrawals: Arc<WithdrawalRepository>,
}

impl AppState {
    pub fn new(
        ledger_service: Arc<LedgerService>,
        withdrawal_service: Arc<WithdrawalService>,
        deposits: Arc<DepositRepository>,
        withdrawals: Arc<WithdrawalRepository>
    ) -> Self {
        Self {
            ledger_service,
            withdrawal_service,
            deposits,
            withdrawals,
        }
    }
}
