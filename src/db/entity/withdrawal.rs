use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawal")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub chain: String,
    pub currency: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub from_address: Option<String>,
    pub to_address: String,
    pub status: String,
    pub tx_hash: Option<String>,
    pub tx_url: Option<String>,
    pub email_verified: bool,
    pub confirmations: i32,
    pub failure_reason: Option<String>,
    /// Set before the signer is ever invoked; a non-null value on a
    /// PROCESSING row means a broadcast may already be in flight.
    pub broadcast_attempted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
