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

use crate::db::entity::{ withdrawal, Withdrawal };
use crate::enums::WithdrawalStatus;
use crate::error::{ AppError, Result };

pub struct WithdrawalRepository {
    db: DatabaseConnection,
}

impl WithdrawalRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<withdrawal::Model> {
        Withdrawal::find_by_id(id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))
    }

    /// Fetch with a row lock inside a caller-owned transaction; every
    /// state transition goes through this so transitions are serialized
    /// per withdrawal.
    pub async fn find_by_id_locked<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid
    ) -> Result<withdrawal::Model> {
        Withdrawal::find_by_id(id)
            .lock_exclusive()
            .one(conn).await?
            .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))
    }

    pub async fn find_by_status(&self, status: WithdrawalStatus) -> Result<Vec<withdrawal::Model>> {
        let records = Withdrawal::find()
            .filter(withdrawal::Column::Status.eq(status.as_str()))
            .all(&self.db).await?;

        Ok(records)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<withdrawal::Model>> {
        let records = Withdrawal::find()
            .filter(withdrawal::Column::UserId.eq(user_id))
            .order_by_desc(withdrawal::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(records)
    }
}
