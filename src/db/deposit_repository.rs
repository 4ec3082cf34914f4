use sea_orm::{
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::db::entity::{ deposit, Deposit };
use crate::enums::DepositStatus;
use crate::error::{ AppError, Result };

pub struct DepositRepository {
    db: DatabaseConnection,
}

impl DepositRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<deposit::Model> {
        Deposit::find_by_id(id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Deposit not found".to_string()))
    }

    /// Lookup by the dedup key (chain, tx_hash, event_index).
    pub async fn find_by_chain_event(
        &self,
        chain: &str,
        tx_hash: &str,
        event_index: i64
    ) -> Result<Option<deposit::Model>> {
        let record = Deposit::find()
            .filter(deposit::Column::Chain.eq(chain))
            .filter(deposit::Column::TxHash.eq(tx_hash))
            .filter(deposit::Column::EventIndex.eq(event_index))
            .one(&self.db).await?;

        Ok(record)
    }

    /// Same lookup, inside a caller-owned transaction with a row lock so a
    /// confirmation update and a completing credit cannot interleave.
    pub async fn find_by_id_locked<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid
    ) -> Result<Option<deposit::Model>> {
        let record = Deposit::find_by_id(id).lock_exclusive().one(conn).await?;
        Ok(record)
    }

    /// Deposits still waiting on confirmations for one chain.
    pub async fn find_unfinished_by_chain(&self, chain: &str) -> Result<Vec<deposit::Model>> {
        let records = Deposit::find()
            .filter(deposit::Column::Chain.eq(chain))
            .filter(
                deposit::Column::Status.is_in([
                    DepositStatus::Pending.as_str(),
                    DepositStatus::Confirming.as_str(),
                ])
            )
            .all(&self.db).await?;

        Ok(records)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<deposit::Model>> {
        let records = Deposit::find()
            .filter(deposit::Column::UserId.eq(user_id))
            .order_by_desc(deposit::Column::SubmittedAt)
            .all(&self.db).await?;

        Ok(records)
    }
}
