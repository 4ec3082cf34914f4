use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// One-time short-lived code; consumed exactly once by a conditional
/// used = false -> true update.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_code")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub code: String,
    pub kind: String,
    pub withdrawal_id: Option<Uuid>,
    pub expires_at: DateTimeUtc,
    pub used: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
