use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ ActiveModelTrait, DatabaseConnection, Set, TransactionTrait };
use uuid::Uuid;

use crate::db::entity::deposit;
use crate::db::{ DepositRepository, WalletAddressRepository };
use crate::enums::{ Chain, DepositStatus };
use crate::error::{ AppError, Result };
use crate::registry::ChainRegistry;
use crate::scanner::DepositCandidate;
use crate::services::ledger_service::{ LedgerOp, LedgerService };
use crate::services::notification_service::{ Notice, Notifier };

/// Turns scanner candidates into confirmed ledger credits.
///
/// PENDING -> CONFIRMING -> COMPLETED. There is no failed state: a
/// candidate that is below minimum or not addressed to us is never
/// persisted. The unique (chain, tx_hash, event_index) index is the
/// idempotency guard; racing scanner ticks at worst insert once and
/// no-op afterwards.
pub struct DepositService {
    db: DatabaseConnection,
    addresses: Arc<WalletAddressRepository>,
    deposits: Arc<DepositRepository>,
    ledger: Arc<LedgerService>,
    registry: Arc<ChainRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl DepositService {
    pub fn new(
        db: DatabaseConnection,
        addresses: Arc<WalletAddressRepository>,
        deposits: Arc<DepositRepository>,
        ledger: Arc<LedgerService>,
        registry: Arc<ChainRegistry>,
        notifier: Arc<dyn Notifier>
    ) -> Self {
        Self {
            db,
            addresses,
            deposits,
            ledger,
            registry,
            notifier,
        }
    }

    /// Process one observed candidate: first sight creates the deposit,
    /// later sightings only refresh its confirmation count.
    pub async fn ingest(&self, candidate: &DepositCandidate) -> Result<Option<deposit::Model>> {
        let chain = candidate.chain;
        let to_address = Self::normalize_address(chain, &candidate.to_address);

        if
            let Some(existing) = self.deposits.find_by_chain_event(
                chain.as_str(),
                &candidate.tx_hash,
                candidate.event_index
            ).await?
        {
            let updated = self.update_confirmations(
                existing.id,
                candidate.confirmations,
                candidate.block_number
            ).await?;
            return Ok(Some(updated));
        }

        // Resolve the owning user; transfers to addresses we do not track
        // are not deposits.
        let Some(owner) = self.addresses.find_by_chain_and_address(
            chain.as_str(),
            &to_address
        ).await? else {
            tracing::debug!(
                chain = %chain,
                address = %to_address,
                tx_hash = %candidate.tx_hash,
                "Transfer to unknown address, skipping"
            );
            return Ok(None);
        };

        let token = self.registry.token(chain, &candidate.token)?;
        if candidate.amount < token.min_deposit {
            tracing::warn!(
                chain = %chain,
                tx_hash = %candidate.tx_hash,
                amount = %candidate.amount,
                minimum = %token.min_deposit,
                "Deposit below minimum, not recorded"
            );
            return Ok(None);
        }

        let spec = self.registry.chain(chain)?;
        let required = spec.required_confirmations;
        let confirmations = candidate.confirmations;

        let status = Self::initial_status(confirmations);

        let unit_price = self.ledger.unit_price(&token.symbol).await;
        let now = Utc::now();

        let active = deposit::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.user_id.clone()),
            chain: Set(chain.as_str().to_string()),
            currency: Set(token.symbol.clone()),
            tx_hash: Set(candidate.tx_hash.clone()),
            event_index: Set(candidate.event_index),
            from_address: Set(candidate.from_address.clone()),
            to_address: Set(to_address),
            amount: Set(candidate.amount),
            // No deposit-side fee is charged.
            fee: Set(rust_decimal::Decimal::ZERO),
            net_amount: Set(candidate.amount),
            confirmations: Set(confirmations),
            required_confirmations: Set(required),
            status: Set(status.as_str().to_string()),
            block_number: Set(candidate.block_number),
            submitted_at: Set(candidate.timestamp),
            confirmed_at: Set((confirmations > 0).then_some(now)),
            completed_at: Set(None),
        };

        let txn = self.db.begin().await?;

        let mut model = match active.insert(&txn).await {
            Ok(model) => model,
            Err(e) if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) => {
                // Another tick inserted the same chain event first. The
                // index did its job; nothing to do.
                txn.rollback().await?;
                return Ok(None);
            }
            Err(e) => {
                return Err(e.into());
            }
        };

        let mut completed = false;
        if confirmations >= required {
            model = self.complete_in(&txn, model, unit_price).await?;
            completed = true;
        }

        txn.commit().await?;

        self.notifier.send(Notice::DepositPending {
            user_id: model.user_id.clone(),
            currency: model.currency.clone(),
            amount: model.amount,
            tx_hash: model.tx_hash.clone(),
        }).await;

        if completed {
            self.notify_confirmed(&model).await;
        }

        Ok(Some(model))
    }

    /// Refresh the confirmation count of an existing deposit; crossing the
    /// threshold completes it and credits the ledger in one transaction.
    pub async fn update_confirmations(
        &self,
        deposit_id: Uuid,
        observed_confirmations: i32,
        block_number: Option<i64>
    ) -> Result<deposit::Model> {
        // Read outside the transaction only for the price prefetch.
        let current = self.deposits.find_by_id(deposit_id).await?;
        if DepositStatus::from_str(&current.status)?.is_terminal() {
            return Ok(current);
        }

        let unit_price = self.ledger.unit_price(&current.currency).await;

        let txn = self.db.begin().await?;

        let Some(model) = self.deposits.find_by_id_locked(&txn, deposit_id).await? else {
            txn.rollback().await?;
            return Err(AppError::NotFound("Deposit not found".to_string()));
        };

        // Re-check under the lock: a racing tick may have completed it.
        if DepositStatus::from_str(&model.status)?.is_terminal() {
            txn.rollback().await?;
            return Ok(model);
        }

        let confirmations = model.confirmations.max(observed_confirmations);
        let required = model.required_confirmations;
        let first_confirmation = model.confirmed_at.is_none() && confirmations > 0;

        let mut active: deposit::ActiveModel = model.into();
        active.confirmations = Set(confirmations);
        if let Some(block) = block_number {
            active.block_number = Set(Some(block));
        }
        if first_confirmation {
            active.confirmed_at = Set(Some(Utc::now()));
        }
        if confirmations > 0 && confirmations < required {
            active.status = Set(DepositStatus::Confirming.as_str().to_string());
        }

        let model = active.update(&txn).await?;

        let (model, completed) = if confirmations >= required {
            (self.complete_in(&txn, model, unit_price).await?, true)
        } else {
            (model, false)
        };

        txn.commit().await?;

        if completed {
            self.notify_confirmed(&model).await;
        }

        Ok(model)
    }

    /// Terminal transition: mark COMPLETED and credit the ledger, both
    /// inside the caller's transaction. Callers guarantee the deposit is
    /// not already terminal.
    async fn complete_in<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        model: deposit::Model,
        unit_price: f64
    ) -> Result<deposit::Model> {
        let user_id = model.user_id.clone();
        let currency = model.currency.clone();
        let chain = Chain::from_str(&model.chain)?;
        let net_amount = model.net_amount;
        let now = Utc::now();

        let mut active: deposit::ActiveModel = model.into();
        active.status = Set(DepositStatus::Completed.as_str().to_string());
        active.completed_at = Set(Some(now));

        let model = active.update(conn).await?;

        self.ledger.apply_in(
            conn,
            &user_id,
            &currency,
            chain,
            LedgerOp::Credit(net_amount),
            unit_price
        ).await?;

        Ok(model)
    }

    async fn notify_confirmed(&self, model: &deposit::Model) {
        self.notifier.send(Notice::DepositConfirmed {
            user_id: model.user_id.clone(),
            currency: model.currency.clone(),
            amount: model.net_amount,
            tx_hash: model.tx_hash.clone(),
        }).await;
    }

    /// Recompute confirmations for every unfinished deposit on a chain
    /// from the current tip. Deposits still in the mempool (no block yet)
    /// are left for the scanner to re-observe.
    pub async fn refresh_chain(&self, chain: Chain, tip: u64) -> Result<()> {
        let unfinished = self.deposits.find_unfinished_by_chain(chain.as_str()).await?;

        for record in unfinished {
            let Some(block) = record.block_number else {
                continue;
            };

            let confirmations = tip
                .saturating_sub(block as u64)
                .saturating_add(1)
                .min(i32::MAX as u64) as i32;

            if let Err(e) = self.update_confirmations(record.id, confirmations, None).await {
                tracing::warn!(
                    deposit = %record.id,
                    error = %e,
                    "Confirmation refresh failed, will retry next tick"
                );
            }
        }

        Ok(())
    }

    fn initial_status(confirmations: i32) -> DepositStatus {
        if confirmations > 0 {
            DepositStatus::Confirming
        } else {
            DepositStatus::Pending
        }
    }

    /// EVM addresses are compared lowercased; other chains are
    /// case-sensitive as issued.
    fn normalize_address(chain: Chain, address: &str) -> String {
        if chain.is_evm() {
            address.to_lowercase()
        } else {
            address.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::{ DatabaseBackend, MockDatabase };

    use crate::db::entity::balance;
    use crate::services::{ PriceService, TracingNotifier };

    fn deposit_model(id: Uuid, status: DepositStatus, confirmations: i32) -> deposit::Model {
        let now = Utc::now();
        deposit::Model {
            id,
            user_id: "user-1".to_string(),
            chain: "ETH".to_string(),
            currency: "USDT".to_string(),
            tx_hash: "0xdeadbeef".to_string(),
            event_index: 7,
            from_address: "0xsender".to_string(),
            to_address: "0xdeposit".to_string(),
            amount: Decimal::new(100, 0),
            fee: Decimal::ZERO,
            net_amount: Decimal::new(100, 0),
            confirmations,
            required_confirmations: 3,
            status: status.as_str().to_string(),
            block_number: Some(1_000),
            submitted_at: now,
            confirmed_at: Some(now),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_threshold_credit_happens_once() {
        let id = Uuid::new_v4();
        let confirming = deposit_model(id, DepositStatus::Confirming, 1);
        let mut at_threshold = confirming.clone();
        at_threshold.confirmations = 3;
        let mut completed = at_threshold.clone();
        completed.status = DepositStatus::Completed.as_str().to_string();
        completed.completed_at = Some(Utc::now());

        let credited = balance::Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            currency: "USDT".to_string(),
            chain: "ETH".to_string(),
            total: Decimal::new(100, 0),
            available: Decimal::new(100, 0),
            locked: Decimal::ZERO,
            frozen: Decimal::ZERO,
            usd_value: Decimal::new(995, 1),
            updated_at: Utc::now(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![confirming.clone()]])
            .append_query_results([vec![confirming]])
            .append_query_results([vec![at_threshold]])
            .append_query_results([vec![completed.clone()]])
            .append_query_results([Vec::<balance::Model>::new()])
            .append_query_results([vec![credited]])
            .append_query_results([vec![completed]])
            .into_connection();

        let service = DepositService::new(
            db.clone(),
            Arc::new(WalletAddressRepository::new(db.clone())),
            Arc::new(DepositRepository::new(db.clone())),
            Arc::new(LedgerService::new(db.clone(), Arc::new(PriceService::new()))),
            Arc::new(ChainRegistry::builtin()),
            Arc::new(TracingNotifier)
        );

        let first = service.update_confirmations(id, 3, None).await.unwrap();
        assert_eq!(first.status, "COMPLETED");

        // Re-observing the same deposit is a terminal no-op; a second
        // credit would demand mock results that do not exist and fail.
        let second = service.update_confirmations(id, 5, None).await.unwrap();
        assert_eq!(second.status, "COMPLETED");

        let log = db.into_transaction_log();
        let balance_inserts: Vec<String> = log
            .iter()
            .map(|t| format!("{:?}", t))
            .filter(|s| s.contains("INSERT INTO") && s.contains("balance"))
            .collect();
        assert_eq!(balance_inserts.len(), 1);
        // Credited with exactly the net amount.
        assert!(balance_inserts[0].contains("100"));
    }

    #[test]
    fn test_initial_status() {
        // A deposit first seen in the mempool stays PENDING and must not
        // be credited; anything with at least one confirmation starts
        // counting down.
        assert_eq!(DepositService::initial_status(0), DepositStatus::Pending);
        assert_eq!(DepositService::initial_status(1), DepositStatus::Confirming);
        assert_eq!(DepositService::initial_status(3), DepositStatus::Confirming);
    }

    #[test]
    fn test_normalize_address_per_family() {
        assert_eq!(
            DepositService::normalize_address(Chain::Eth, "0xABCDef0123"),
            "0xabcdef0123"
        );
        assert_eq!(
            DepositService::normalize_address(Chain::Btc, "bc1qDepositCase"),
            "bc1qDepositCase"
        );
    }
}
