use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    Set,
};
use uuid::Uuid;

use crate::db::entity::{ verification_code, VerificationCode };
use crate::enums::CodeKind;
use crate::error::Result;

pub struct CodeRepository {
    db: DatabaseConnection,
}

impl CodeRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: String,
        code: String,
        kind: CodeKind,
        withdrawal_id: Uuid,
        ttl: chrono::Duration
    ) -> Result<verification_code::Model> {
        let record = verification_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            code: Set(code),
            kind: Set(kind.as_str().to_string()),
            withdrawal_id: Set(Some(withdrawal_id)),
            expires_at: Set(Utc::now() + ttl),
            used: Set(false),
            created_at: Set(Utc::now()),
        };

        let record = record.insert(&self.db).await?;
        Ok(record)
    }

    /// Atomically consume a matching, unused, unexpired code. Returns true
    /// when exactly one row flipped used = false -> true; a reused or
    /// unknown code flips nothing. Takes a caller-owned connection so the
    /// consumption can share a transaction with the state change it gates.
    pub async fn consume<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        code: &str,
        kind: CodeKind,
        withdrawal_id: Uuid
    ) -> Result<bool> {
        let result = VerificationCode::update_many()
            .col_expr(verification_code::Column::Used, Expr::value(true))
            .filter(verification_code::Column::UserId.eq(user_id))
            .filter(verification_code::Column::Code.eq(code))
            .filter(verification_code::Column::Kind.eq(kind.as_str()))
            .filter(verification_code::Column::WithdrawalId.eq(withdrawal_id))
            .filter(verification_code::Column::Used.eq(false))
            .filter(verification_code::Column::ExpiresAt.gt(Utc::now()))
            .exec(conn).await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ DatabaseBackend, MockDatabase, MockExecResult };

    #[tokio::test]
    async fn test_consume_rejects_reuse() {
        // The first consumption flips the row; the second matches nothing
        // because used = true is filtered out.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult { last_insert_id: 0, rows_affected: 1 },
                MockExecResult { last_insert_id: 0, rows_affected: 0 },
            ])
            .into_connection();

        let repo = CodeRepository::new(db.clone());
        let withdrawal_id = Uuid::new_v4();

        let first = repo
            .consume(&db, "user-1", "482910", CodeKind::Withdrawal, withdrawal_id).await
            .unwrap();
        assert!(first);

        let second = repo
            .consume(&db, "user-1", "482910", CodeKind::Withdrawal, withdrawal_id).await
            .unwrap();
        assert!(!second);
    }
}
