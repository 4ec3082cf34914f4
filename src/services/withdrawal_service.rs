use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{ ActiveModelTrait, DatabaseConnection, Set, TransactionTrait };
use uuid::Uuid;

use crate::address;
use crate::db::entity::withdrawal;
use crate::db::{ CodeRepository, WithdrawalRepository };
use crate::enums::{ Chain, CodeKind, WithdrawalStatus };
use crate::error::{ AppError, Result };
use crate::registry::ChainRegistry;
use crate::services::broadcast::Broadcaster;
use crate::services::ledger_service::{ LedgerOp, LedgerService };
use crate::services::notification_service::{ Notice, Notifier };

const CODE_TTL_MINUTES: i64 = 5;

/// User withdrawal intent, validated before anything is locked.
#[derive(serde::Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: String,
    pub chain: Chain,
    pub currency: String,
    pub to_address: String,
    pub amount: Decimal,
}

/// The withdrawal state machine.
///
/// PENDING -> PROCESSING -> AWAITING_CONFIRMATION -> COMPLETED, with
/// CANCELLED reachable from the first two states and FAILED from any
/// non-terminal state. Funds are locked on request and every terminal
/// path reconciles exactly one ledger partition: completion releases the
/// lock out of the system, cancellation and failure return it.
pub struct WithdrawalService {
    db: DatabaseConnection,
    withdrawals: Arc<WithdrawalRepository>,
    codes: Arc<CodeRepository>,
    ledger: Arc<LedgerService>,
    registry: Arc<ChainRegistry>,
    notifier: Arc<dyn Notifier>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl WithdrawalService {
    pub fn new(
        db: DatabaseConnection,
        withdrawals: Arc<WithdrawalRepository>,
        codes: Arc<CodeRepository>,
        ledger: Arc<LedgerService>,
        registry: Arc<ChainRegistry>,
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn Broadcaster>
    ) -> Self {
        Self {
            db,
            withdrawals,
            codes,
            ledger,
            registry,
            notifier,
            broadcaster,
        }
    }

    /// Accept a withdrawal intent: validate, lock funds, issue a one-time
    /// verification code. No external action happens until the code is
    /// verified.
    pub async fn request(&self, request: WithdrawalRequest) -> Result<withdrawal::Model> {
        let token = self.registry.token(request.chain, &request.currency)?;

        if request.amount < token.min_withdrawal {
            return Err(
                AppError::BelowMinimum(
                    format!(
                        "Minimum withdrawal for {} on {} is {}",
                        token.symbol,
                        request.chain,
                        token.min_withdrawal
                    )
                )
            );
        }

        if !address::is_valid(request.chain, &request.to_address) {
            return Err(AppError::InvalidAddress);
        }

        let fee = token.withdrawal_fee;
        let net_amount = request.amount - fee;
        if net_amount <= Decimal::ZERO {
            return Err(
                AppError::BelowMinimum(format!("Amount does not cover the {} fee", fee))
            );
        }

        let currency = token.symbol.clone();
        let unit_price = self.ledger.unit_price(&currency).await;

        // Lock and persist atomically: either the funds are earmarked and
        // the withdrawal exists, or neither.
        let txn = self.db.begin().await?;

        self.ledger.apply_in(
            &txn,
            &request.user_id,
            &currency,
            request.chain,
            LedgerOp::Lock(request.amount),
            unit_price
        ).await?;

        let now = Utc::now();
        let active = withdrawal::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(request.user_id.clone()),
            chain: Set(request.chain.as_str().to_string()),
            currency: Set(currency.clone()),
            amount: Set(request.amount),
            fee: Set(fee),
            net_amount: Set(net_amount),
            from_address: Set(None),
            to_address: Set(request.to_address.clone()),
            status: Set(WithdrawalStatus::Pending.as_str().to_string()),
            tx_hash: Set(None),
            tx_url: Set(None),
            email_verified: Set(false),
            confirmations: Set(0),
            failure_reason: Set(None),
            broadcast_attempted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        };

        let model = active.insert(&txn).await?;
        txn.commit().await?;

        let code = Self::generate_code();
        self.codes.create(
            request.user_id.clone(),
            code.clone(),
            CodeKind::Withdrawal,
            model.id,
            chrono::Duration::minutes(CODE_TTL_MINUTES)
        ).await?;

        self.notifier.send(Notice::WithdrawalRequested {
            user_id: model.user_id.clone(),
            withdrawal_id: model.id,
            currency: model.currency.clone(),
            amount: model.amount,
            code,
        }).await;

        Ok(model)
    }

    /// Verify the one-time code. Consuming the code and flipping the
    /// status happen in one transaction: either the code is spent and the
    /// withdrawal is PROCESSING, or neither. A reused, expired or
    /// mismatched code changes nothing and is rejected.
    pub async fn verify(
        &self,
        user_id: &str,
        withdrawal_id: Uuid,
        code: &str
    ) -> Result<withdrawal::Model> {
        let current = self.withdrawals.find_by_id(withdrawal_id).await?;
        if current.user_id != user_id {
            return Err(AppError::NotFound("Withdrawal not found".to_string()));
        }
        if WithdrawalStatus::from_str(&current.status)? != WithdrawalStatus::Pending {
            return Err(
                AppError::InvalidState(format!("Cannot verify withdrawal in {}", current.status))
            );
        }

        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        if WithdrawalStatus::from_str(&model.status)? != WithdrawalStatus::Pending {
            txn.rollback().await?;
            return Err(
                AppError::InvalidState(format!("Cannot verify withdrawal in {}", model.status))
            );
        }

        let consumed = self.codes.consume(
            &txn,
            user_id,
            code,
            CodeKind::Withdrawal,
            withdrawal_id
        ).await?;
        if !consumed {
            txn.rollback().await?;
            return Err(AppError::InvalidCode);
        }

        let mut active: withdrawal::ActiveModel = model.into();
        active.status = Set(WithdrawalStatus::Processing.as_str().to_string());
        active.email_verified = Set(true);
        active.updated_at = Set(Utc::now());

        let model = active.update(&txn).await?;
        txn.commit().await?;

        Ok(model)
    }

    /// Hand every verified withdrawal to the signer. The attempt is
    /// persisted before the signer sees the withdrawal, so a crash between
    /// signing and storing the hash re-sends the same withdrawal_id to the
    /// idempotent signer instead of silently dropping or double-spending.
    /// Broadcast failures leave the withdrawal in PROCESSING for the next
    /// tick.
    pub async fn process_verified(&self) -> Result<()> {
        let processing = self.withdrawals.find_by_status(WithdrawalStatus::Processing).await?;

        for record in processing {
            if record.broadcast_attempted_at.is_some() {
                tracing::warn!(
                    withdrawal = %record.id,
                    "Prior broadcast attempt recorded, re-sending to signer"
                );
            }

            let record = match self.mark_broadcast_attempt(record.id).await {
                Ok(Some(record)) => record,
                // Raced into another state between the select and the lock.
                Ok(None) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        withdrawal = %record.id,
                        error = %e,
                        "Failed to record broadcast attempt, withdrawal not sent"
                    );
                    continue;
                }
            };

            match self.broadcaster.broadcast(&record).await {
                Ok(tx_hash) => {
                    if let Err(e) = self.mark_broadcast(record.id, &tx_hash).await {
                        tracing::error!(
                            withdrawal = %record.id,
                            tx_hash = %tx_hash,
                            error = %e,
                            "Broadcast succeeded but recording it failed"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        withdrawal = %record.id,
                        error = %e,
                        "Broadcast failed, will retry next tick"
                    );
                }
            }
        }

        Ok(())
    }

    /// Record that the signer is about to be invoked. Nothing irreversible
    /// may happen for a withdrawal whose attempt is not on disk first.
    /// Returns None when the withdrawal is no longer PROCESSING.
    async fn mark_broadcast_attempt(&self, withdrawal_id: Uuid) -> Result<Option<withdrawal::Model>> {
        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        if WithdrawalStatus::from_str(&model.status)? != WithdrawalStatus::Processing {
            txn.rollback().await?;
            return Ok(None);
        }

        let mut active: withdrawal::ActiveModel = model.into();
        active.broadcast_attempted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        let model = active.update(&txn).await?;
        txn.commit().await?;

        Ok(Some(model))
    }

    /// Store the signer's tx hash: PROCESSING -> AWAITING_CONFIRMATION.
    /// From this point the withdrawal can no longer be cancelled.
    pub async fn mark_broadcast(
        &self,
        withdrawal_id: Uuid,
        tx_hash: &str
    ) -> Result<withdrawal::Model> {
        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        let status = WithdrawalStatus::from_str(&model.status)?;
        if status == WithdrawalStatus::AwaitingConfirmation {
            // Re-broadcast race; the hash is already recorded.
            txn.rollback().await?;
            return Ok(model);
        }
        if status != WithdrawalStatus::Processing {
            txn.rollback().await?;
            return Err(
                AppError::InvalidState(format!("Cannot record broadcast in {}", model.status))
            );
        }

        let chain = Chain::from_str(&model.chain)?;
        let tx_url = self.registry.chain(chain)?.tx_url(tx_hash);

        let mut active: withdrawal::ActiveModel = model.into();
        active.status = Set(WithdrawalStatus::AwaitingConfirmation.as_str().to_string());
        active.tx_hash = Set(Some(tx_hash.to_string()));
        active.tx_url = Set(Some(tx_url));
        active.updated_at = Set(Utc::now());

        let model = active.update(&txn).await?;
        txn.commit().await?;

        Ok(model)
    }

    /// Record an observed confirmation count; reaching the chain's
    /// threshold completes the withdrawal and releases the locked funds,
    /// exactly once.
    pub async fn record_confirmations(
        &self,
        withdrawal_id: Uuid,
        confirmations: u64
    ) -> Result<withdrawal::Model> {
        let current = self.withdrawals.find_by_id(withdrawal_id).await?;
        if WithdrawalStatus::from_str(&current.status)?.is_terminal() {
            return Ok(current);
        }

        let unit_price = self.ledger.unit_price(&current.currency).await;
        let chain = Chain::from_str(&current.chain)?;
        let required = self.registry.chain(chain)?.required_confirmations;

        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        // Only an in-flight broadcast accumulates confirmations; anything
        // else here is a racing worker and a no-op.
        if WithdrawalStatus::from_str(&model.status)? != WithdrawalStatus::AwaitingConfirmation {
            txn.rollback().await?;
            return Ok(model);
        }

        let confirmations = confirmations.min(i32::MAX as u64) as i32;
        let completing = confirmations >= required;

        let user_id = model.user_id.clone();
        let currency = model.currency.clone();
        let amount = model.amount;

        let mut active: withdrawal::ActiveModel = model.into();
        active.confirmations = Set(confirmations);
        active.updated_at = Set(Utc::now());
        if completing {
            active.status = Set(WithdrawalStatus::Completed.as_str().to_string());
            active.completed_at = Set(Some(Utc::now()));
        }

        let model = active.update(&txn).await?;

        if completing {
            // The funds have actually left the system.
            self.ledger.apply_in(
                &txn,
                &user_id,
                &currency,
                chain,
                LedgerOp::ReleaseLocked(amount),
                unit_price
            ).await?;
        }

        txn.commit().await?;

        if completing {
            self.notifier.send(Notice::WithdrawalSucceeded {
                user_id: model.user_id.clone(),
                withdrawal_id: model.id,
                currency: model.currency.clone(),
                amount: model.amount,
                tx_url: model.tx_url.clone(),
            }).await;
        }

        Ok(model)
    }

    /// User-initiated cancellation, valid only before broadcast. Returns
    /// the locked funds to available.
    pub async fn cancel(&self, user_id: &str, withdrawal_id: Uuid) -> Result<withdrawal::Model> {
        let current = self.withdrawals.find_by_id(withdrawal_id).await?;
        if current.user_id != user_id {
            return Err(AppError::NotFound("Withdrawal not found".to_string()));
        }

        let unit_price = self.ledger.unit_price(&current.currency).await;

        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        if !WithdrawalStatus::from_str(&model.status)?.is_cancellable() {
            txn.rollback().await?;
            return Err(
                AppError::InvalidState(format!("Cannot cancel withdrawal in {}", model.status))
            );
        }

        let chain = Chain::from_str(&model.chain)?;
        let currency = model.currency.clone();
        let amount = model.amount;

        let mut active: withdrawal::ActiveModel = model.into();
        active.status = Set(WithdrawalStatus::Cancelled.as_str().to_string());
        active.updated_at = Set(Utc::now());

        let model = active.update(&txn).await?;

        self.ledger.apply_in(
            &txn,
            user_id,
            &currency,
            chain,
            LedgerOp::Unlock(amount),
            unit_price
        ).await?;

        txn.commit().await?;

        Ok(model)
    }

    /// System-initiated failure from any non-terminal state. The full
    /// locked amount returns to the user; nothing left the system.
    pub async fn fail(&self, withdrawal_id: Uuid, reason: &str) -> Result<withdrawal::Model> {
        let current = self.withdrawals.find_by_id(withdrawal_id).await?;
        let unit_price = self.ledger.unit_price(&current.currency).await;

        let txn = self.db.begin().await?;
        let model = self.withdrawals.find_by_id_locked(&txn, withdrawal_id).await?;

        if WithdrawalStatus::from_str(&model.status)?.is_terminal() {
            txn.rollback().await?;
            // Failing a settled withdrawal is a caller bug, not user input.
            tracing::error!(
                withdrawal = %withdrawal_id,
                status = %model.status,
                "Attempted to fail a terminal withdrawal"
            );
            return Err(
                AppError::InvalidState(format!("Cannot fail withdrawal in {}", model.status))
            );
        }

        let chain = Chain::from_str(&model.chain)?;
        let user_id = model.user_id.clone();
        let currency = model.currency.clone();
        let amount = model.amount;

        let mut active: withdrawal::ActiveModel = model.into();
        active.status = Set(WithdrawalStatus::Failed.as_str().to_string());
        active.failure_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(Utc::now());

        let model = active.update(&txn).await?;

        self.ledger.apply_in(
            &txn,
            &user_id,
            &currency,
            chain,
            LedgerOp::Unlock(amount),
            unit_price
        ).await?;

        txn.commit().await?;

        self.notifier.send(Notice::WithdrawalFailed {
            user_id: model.user_id.clone(),
            withdrawal_id: model.id,
            reason: reason.to_string(),
        }).await;

        Ok(model)
    }

    /// Six decimal digits, matching what users receive out-of-band.
    fn generate_code() -> String {
        rand::rng().random_range(100_000..1_000_000).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{ DateTime, Utc };
    use sea_orm::{ DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult };

    use crate::services::{ PriceService, TracingNotifier };

    #[derive(Default)]
    struct RecordingBroadcaster {
        seen: std::sync::Mutex<Vec<withdrawal::Model>>,
    }

    #[async_trait::async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, withdrawal: &withdrawal::Model) -> Result<String> {
            self.seen.lock().unwrap().push(withdrawal.clone());
            Err(AppError::External("signer offline".to_string()))
        }
    }

    fn service_with(db: DatabaseConnection, broadcaster: Arc<dyn Broadcaster>) -> WithdrawalService {
        let prices = Arc::new(PriceService::new());
        WithdrawalService::new(
            db.clone(),
            Arc::new(WithdrawalRepository::new(db.clone())),
            Arc::new(CodeRepository::new(db.clone())),
            Arc::new(LedgerService::new(db, prices)),
            Arc::new(ChainRegistry::builtin()),
            Arc::new(TracingNotifier),
            broadcaster
        )
    }

    fn withdrawal_model(
        id: Uuid,
        status: WithdrawalStatus,
        broadcast_attempted_at: Option<DateTime<Utc>>
    ) -> withdrawal::Model {
        let now = Utc::now();
        withdrawal::Model {
            id,
            user_id: "user-1".to_string(),
            chain: "ETH".to_string(),
            currency: "USDT".to_string(),
            amount: Decimal::new(100, 0),
            fee: Decimal::new(5, 0),
            net_amount: Decimal::new(95, 0),
            from_address: None,
            to_address: "0x742d35cc6634c0532925a3b844bc9e7595f0beb0".to_string(),
            status: status.as_str().to_string(),
            tx_hash: None,
            tx_url: None,
            email_verified: false,
            confirmations: 0,
            failure_reason: None,
            broadcast_attempted_at,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..100 {
            let code = WithdrawalService::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_attempt_persisted_before_signer_invoked() {
        let id = Uuid::new_v4();
        let unsent = withdrawal_model(id, WithdrawalStatus::Processing, None);
        let mut attempted = unsent.clone();
        attempted.broadcast_attempted_at = Some(Utc::now());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![unsent.clone()]])
            .append_query_results([vec![unsent]])
            .append_query_results([vec![attempted]])
            .into_connection();

        let recorder = Arc::new(RecordingBroadcaster::default());
        let service = service_with(db, recorder.clone());

        service.process_verified().await.unwrap();

        // The signer only ever sees a record whose attempt is already
        // committed; the broadcast failure leaves it PROCESSING for the
        // next tick.
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].broadcast_attempted_at.is_some());
    }

    #[tokio::test]
    async fn test_verify_wrong_code_rolls_back() {
        let id = Uuid::new_v4();
        let pending = withdrawal_model(id, WithdrawalStatus::Pending, None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pending.clone()]])
            .append_query_results([vec![pending]])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 0 }])
            .into_connection();

        let recorder = Arc::new(RecordingBroadcaster::default());
        let service = service_with(db, recorder.clone());

        let err = service.verify("user-1", id, "000000").await.unwrap_err();

        // The whole transaction rolls back: the withdrawal stays PENDING
        // and an unconsumed real code can still be redeemed.
        assert!(matches!(err, AppError::InvalidCode));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
