use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

/// User-facing events emitted by the pipelines. Delivery transport
/// (email, push, chat) is a collaborator; the pipelines only emit.
#[derive(Debug, Clone)]
pub enum Notice {
    DepositPending {
        user_id: String,
        currency: String,
        amount: Decimal,
        tx_hash: String,
    },
    DepositConfirmed {
        user_id: String,
        currency: String,
        amount: Decimal,
        tx_hash: String,
    },
    WithdrawalRequested {
        user_id: String,
        withdrawal_id: Uuid,
        currency: String,
        amount: Decimal,
        code: String,
    },
    WithdrawalSucceeded {
        user_id: String,
        withdrawal_id: Uuid,
        currency: String,
        amount: Decimal,
        tx_url: Option<String>,
    },
    WithdrawalFailed {
        user_id: String,
        withdrawal_id: Uuid,
        reason: String,
    },
}

/// Fire-and-forget notification sink. Implementations must swallow their
/// own delivery errors; a failed notification never fails a pipeline
/// transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: Notice);
}

/// Default sink: structured log lines. Real transports live outside this
/// service.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, notice: Notice) {
        match &notice {
            Notice::DepositPending { user_id, currency, amount, tx_hash } => {
                tracing::info!(
                    user = %user_id,
                    currency = %currency,
                    amount = %amount,
                    tx_hash = %tx_hash,
                    "Deposit detected, awaiting confirmations"
                );
            }
            Notice::DepositConfirmed { user_id, currency, amount, tx_hash } => {
                tracing::info!(
                    user = %user_id,
                    currency = %currency,
                    amount = %amount,
                    tx_hash = %tx_hash,
                    "Deposit confirmed and credited"
                );
            }
            Notice::WithdrawalRequested { user_id, withdrawal_id, currency, amount, .. } => {
                tracing::info!(
                    user = %user_id,
                    withdrawal = %withdrawal_id,
                    currency = %currency,
                    amount = %amount,
                    "Withdrawal requested, verification code sent"
                );
            }
            Notice::WithdrawalSucceeded { user_id, withdrawal_id, currency, amount, .. } => {
                tracing::info!(
                    user = %user_id,
                    withdrawal = %withdrawal_id,
                    currency = %currency,
                    amount = %amount,
                    "Withdrawal completed"
                );
            }
            Notice::WithdrawalFailed { user_id, withdrawal_id, reason } => {
                tracing::warn!(
                    user = %user_id,
                    withdrawal = %withdrawal_id,
                    reason = %reason,
                    "Withdrawal failed"
                );
            }
        }
    }
}
