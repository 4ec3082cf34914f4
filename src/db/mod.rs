use sea_orm::{ entity::prelude::*, DatabaseConnection, Set };
use uuid::Uuid;

use crate::error::Result;

pub mod entity;
pub use entity::*;

mod deposit_repository;
pub use deposit_repository::DepositRepository;

mod withdrawal_repository;
pub use withdrawal_repository::WithdrawalRepository;

mod code_repository;
pub use code_repository::CodeRepository;

mod watermark_repository;
pub use watermark_repository::WatermarkRepository;

pub struct WalletAddressRepository {
    db: DatabaseConnection,
}

impl WalletAddressRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: String,
        chain: String,
        address: String
    ) -> Result<entity::wallet_address::Model> {
        let record = entity::wallet_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            chain: Set(chain),
            address: Set(address),
            created_at: Set(chrono::Utc::now()),
        };

        let record = record.insert(&self.db).await?;
        Ok(record)
    }

    /// Resolve the owner of a deposit address. None means the address is
    /// not ours and the candidate should be skipped.
    pub async fn find_by_chain_and_address(
        &self,
        chain: &str,
        address: &str
    ) -> Result<Option<entity::wallet_address::Model>> {
        let record = entity::wallet_address::Entity
            ::find()
            .filter(entity::wallet_address::Column::Chain.eq(chain))
            .filter(entity::wallet_address::Column::Address.eq(address))
            .one(&self.db).await?;

        Ok(record)
    }

    /// All registered deposit addresses on one chain; the scanner's input.
    pub async fn addresses_for_chain(&self, chain: &str) -> Result<Vec<String>> {
        let records = entity::wallet_address::Entity
            ::find()
            .filter(entity::wallet_address::Column::Chain.eq(chain))
            .all(&self.db).await?;

        Ok(records.into_iter().map(|r| r.address).collect())
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<entity::wallet_address::Model>> {
        let records = entity::wallet_address::Entity
            ::find()
            .filter(entity::wallet_address::Column::UserId.eq(user_id))
            .all(&self.db).await?;

        Ok(records)
    }
}
