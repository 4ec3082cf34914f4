use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// A detected chain event crediting a user. (chain, tx_hash, event_index)
/// carries a unique index so the same event can never be processed twice.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deposit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub chain: String,
    pub currency: String,
    pub tx_hash: String,
    /// UTXO output index or EVM log index within the transaction.
    pub event_index: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub confirmations: i32,
    pub required_confirmations: i32,
    pub status: String,
    pub block_number: Option<i64>,
    pub submitted_at: DateTimeUtc,
    pub confirmed_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
