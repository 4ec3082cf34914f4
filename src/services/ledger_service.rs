use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QuerySelect,
    Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::db::entity::balance;
use crate::enums::Chain;
use crate::error::{ AppError, Result };
use crate::services::PriceService;

/// One ledger mutation. Each variant moves value between the four
/// partitions of a single (user, currency, chain) row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedgerOp {
    /// total += x; available += x. Completed deposit only.
    Credit(Decimal),
    /// total -= x; available -= x.
    Debit(Decimal),
    /// available -= x; locked += x. Withdrawal accepted.
    Lock(Decimal),
    /// available += x; locked -= x. Withdrawal cancelled or failed.
    Unlock(Decimal),
    /// total -= x; locked -= x. Withdrawal completed; funds left the system.
    ReleaseLocked(Decimal),
}

impl LedgerOp {
    pub fn amount(&self) -> Decimal {
        match *self {
            | LedgerOp::Credit(a)
            | LedgerOp::Debit(a)
            | LedgerOp::Lock(a)
            | LedgerOp::Unlock(a)
            | LedgerOp::ReleaseLocked(a) => a,
        }
    }
}

/// The four balance partitions, with the arithmetic for every ledger
/// operation. Pure value type: every mutation either upholds
/// total == available + locked + frozen or fails without changing anything.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Partitions {
    pub total: Decimal,
    pub available: Decimal,
    pub locked: Decimal,
    pub frozen: Decimal,
}

impl Partitions {
    pub fn from_model(model: &balance::Model) -> Self {
        Self {
            total: model.total,
            available: model.available,
            locked: model.locked,
            frozen: model.frozen,
        }
    }

    pub fn check(&self) -> Result<()> {
        if
            self.available < Decimal::ZERO ||
            self.locked < Decimal::ZERO ||
            self.frozen < Decimal::ZERO ||
            self.total < Decimal::ZERO
        {
            return Err(AppError::InvalidState("Negative balance partition".to_string()));
        }
        if self.total != self.available + self.locked + self.frozen {
            return Err(
                AppError::InvalidState("Balance partitions do not sum to total".to_string())
            );
        }
        Ok(())
    }

    /// Apply one operation. On error the partitions are unchanged.
    pub fn apply(&mut self, op: LedgerOp) -> Result<()> {
        let amount = op.amount();
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput("Amount must be positive".to_string()));
        }

        let mut next = *self;
        match op {
            LedgerOp::Credit(a) => {
                next.total += a;
                next.available += a;
            }
            LedgerOp::Debit(a) => {
                if next.available < a {
                    return Err(AppError::InsufficientBalance);
                }
                next.total -= a;
                next.available -= a;
            }
            LedgerOp::Lock(a) => {
                if next.available < a {
                    return Err(AppError::InsufficientBalance);
                }
                next.available -= a;
                next.locked += a;
            }
            LedgerOp::Unlock(a) => {
                if next.locked < a {
                    return Err(
                        AppError::InvalidState("Unlock exceeds locked balance".to_string())
                    );
                }
                next.available += a;
                next.locked -= a;
            }
            LedgerOp::ReleaseLocked(a) => {
                if next.locked < a {
                    return Err(
                        AppError::InvalidState("Release exceeds locked balance".to_string())
                    );
                }
                next.total -= a;
                next.locked -= a;
            }
        }

        next.check()?;
        *self = next;
        Ok(())
    }
}

/// The authoritative per-user, per-asset, per-chain balance record.
///
/// Every operation runs in its own transaction with the row locked
/// FOR UPDATE, so concurrent callers on the same row serialize at the
/// database. USD value is recomputed on every mutation but is advisory
/// display data only; it never participates in invariant checks.
pub struct LedgerService {
    db: DatabaseConnection,
    prices: Arc<PriceService>,
}

impl LedgerService {
    pub fn new(db: DatabaseConnection, prices: Arc<PriceService>) -> Self {
        Self { db, prices }
    }

    pub async fn credit(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        amount: Decimal
    ) -> Result<balance::Model> {
        self.run(user_id, currency, chain, LedgerOp::Credit(amount)).await
    }

    pub async fn debit(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        amount: Decimal
    ) -> Result<balance::Model> {
        self.run(user_id, currency, chain, LedgerOp::Debit(amount)).await
    }

    pub async fn lock(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        amount: Decimal
    ) -> Result<balance::Model> {
        self.run(user_id, currency, chain, LedgerOp::Lock(amount)).await
    }

    pub async fn unlock(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        amount: Decimal
    ) -> Result<balance::Model> {
        self.run(user_id, currency, chain, LedgerOp::Unlock(amount)).await
    }

    pub async fn release_locked(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        amount: Decimal
    ) -> Result<balance::Model> {
        self.run(user_id, currency, chain, LedgerOp::ReleaseLocked(amount)).await
    }

    async fn run(
        &self,
        user_id: &str,
        currency: &str,
        chain: Chain,
        op: LedgerOp
    ) -> Result<balance::Model> {
        // Price fetch happens before the transaction: no network call ever
        // runs while the balance row is locked.
        let unit_price = self.unit_price(currency).await;

        let txn = self.db.begin().await?;
        let model = self.apply_in(&txn, user_id, currency, chain, op, unit_price).await?;
        txn.commit().await?;

        Ok(model)
    }

    /// Advisory USD unit price. A failing oracle never fails a ledger
    /// operation.
    pub async fn unit_price(&self, currency: &str) -> f64 {
        match self.prices.get_price(currency).await {
            Ok(price) => price.usd_price,
            Err(e) => {
                tracing::warn!(currency = %currency, error = %e, "Price lookup failed, usd_value stale");
                0.0
            }
        }
    }

    /// Apply one ledger operation inside a caller-owned transaction. The
    /// deposit and withdrawal pipelines use this to make their state
    /// transition and the matching ledger move atomic.
    pub async fn apply_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        currency: &str,
        chain: Chain,
        op: LedgerOp,
        unit_price: f64
    ) -> Result<balance::Model> {
        let existing = balance::Entity
            ::find()
            .filter(balance::Column::UserId.eq(user_id))
            .filter(balance::Column::Currency.eq(currency))
            .filter(balance::Column::Chain.eq(chain.as_str()))
            .lock_exclusive()
            .one(conn).await?;

        let mut partitions = match (&existing, &op) {
            (Some(model), _) => Partitions::from_model(model),
            // Rows are created lazily on first credit only; any other op
            // against a missing row is an empty-balance failure.
            (None, LedgerOp::Credit(_)) => Partitions::default(),
            (None, LedgerOp::Debit(_) | LedgerOp::Lock(_)) => {
                return Err(AppError::InsufficientBalance);
            }
            (None, _) => {
                return Err(AppError::InvalidState("No balance row to unlock".to_string()));
            }
        };

        partitions.apply(op)?;

        let usd_value = Decimal::from_f64(unit_price)
            .map(|p| p * partitions.total)
            .unwrap_or(Decimal::ZERO);

        let model = match existing {
            Some(model) => {
                let mut active: balance::ActiveModel = model.into();
                active.total = Set(partitions.total);
                active.available = Set(partitions.available);
                active.locked = Set(partitions.locked);
                active.frozen = Set(partitions.frozen);
                active.usd_value = Set(usd_value);
                active.updated_at = Set(Utc::now());
                active.update(conn).await?
            }
            None => {
                let active = balance::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    currency: Set(currency.to_string()),
                    chain: Set(chain.as_str().to_string()),
                    total: Set(partitions.total),
                    available: Set(partitions.available),
                    locked: Set(partitions.locked),
                    frozen: Set(partitions.frozen),
                    usd_value: Set(usd_value),
                    updated_at: Set(Utc::now()),
                };
                active.insert(conn).await?
            }
        };

        Ok(model)
    }

    pub async fn balances_for_user(&self, user_id: &str) -> Result<Vec<balance::Model>> {
        let rows = balance::Entity
            ::find()
            .filter(balance::Column::UserId.eq(user_id))
            .all(&self.db).await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    #[test]
    fn test_credit_and_debit() {
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(100, 0))).unwrap();
        assert_eq!(p.total, dec(100, 0));
        assert_eq!(p.available, dec(100, 0));

        p.apply(LedgerOp::Debit(dec(30, 0))).unwrap();
        assert_eq!(p.total, dec(70, 0));
        assert_eq!(p.available, dec(70, 0));
    }

    #[test]
    fn test_debit_beyond_available_fails() {
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(10, 0))).unwrap();

        let err = p.apply(LedgerOp::Debit(dec(11, 0))).unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));
        // Nothing changed.
        assert_eq!(p.available, dec(10, 0));
        assert_eq!(p.total, dec(10, 0));
    }

    #[test]
    fn test_lock_release_cycle() {
        // Scenario: 100 USDT available, withdraw all of it.
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(100, 0))).unwrap();

        p.apply(LedgerOp::Lock(dec(100, 0))).unwrap();
        assert_eq!(p.available, Decimal::ZERO);
        assert_eq!(p.locked, dec(100, 0));
        assert_eq!(p.total, dec(100, 0));

        p.apply(LedgerOp::ReleaseLocked(dec(100, 0))).unwrap();
        assert_eq!(p.locked, Decimal::ZERO);
        assert_eq!(p.total, Decimal::ZERO);
    }

    #[test]
    fn test_lock_unlock_returns_funds() {
        // Scenario: withdrawal fails before broadcast; total never moves.
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(50, 0))).unwrap();

        p.apply(LedgerOp::Lock(dec(20, 0))).unwrap();
        assert_eq!(p.total, dec(50, 0));

        p.apply(LedgerOp::Unlock(dec(20, 0))).unwrap();
        assert_eq!(p.available, dec(50, 0));
        assert_eq!(p.locked, Decimal::ZERO);
        assert_eq!(p.total, dec(50, 0));
    }

    #[test]
    fn test_concurrent_style_overlock_fails() {
        // Scenario: two withdrawals of 60 against 100; the second lock
        // must fail once the first has taken its share.
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(100, 0))).unwrap();

        p.apply(LedgerOp::Lock(dec(60, 0))).unwrap();
        let err = p.apply(LedgerOp::Lock(dec(60, 0))).unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));
    }

    #[test]
    fn test_unlock_beyond_locked_is_invalid_state() {
        let mut p = Partitions::default();
        p.apply(LedgerOp::Credit(dec(10, 0))).unwrap();

        let err = p.apply(LedgerOp::Unlock(dec(1, 0))).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut p = Partitions::default();
        assert!(p.apply(LedgerOp::Credit(Decimal::ZERO)).is_err());
        assert!(p.apply(LedgerOp::Credit(dec(-5, 0))).is_err());
    }

    #[test]
    fn test_invariant_holds_under_random_sequences() {
        // Property check: no sequence of operations, applied or rejected,
        // can ever break total == available + locked + frozen.
        let mut rng = rand::rng();

        for _ in 0..200 {
            let mut p = Partitions::default();

            for _ in 0..500 {
                let amount = dec(rng.random_range(1..1_000), 2);
                let op = match rng.random_range(0..5) {
                    0 => LedgerOp::Credit(amount),
                    1 => LedgerOp::Debit(amount),
                    2 => LedgerOp::Lock(amount),
                    3 => LedgerOp::Unlock(amount),
                    _ => LedgerOp::ReleaseLocked(amount),
                };

                // Failures are fine; partial application is not.
                let _ = p.apply(op);

                p.check().unwrap();
            }
        }
    }
}
