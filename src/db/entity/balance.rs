use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// One ledger row per (user, currency, chain).
///
/// Invariant: total == available + locked + frozen, enforced by every
/// mutating operation inside its transaction. usd_value is advisory
/// display data only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub currency: String,
    pub chain: String,
    pub total: Decimal,
    pub available: Decimal,
    pub locked: Decimal,
    pub frozen: Decimal,
    pub usd_value: Decimal,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
