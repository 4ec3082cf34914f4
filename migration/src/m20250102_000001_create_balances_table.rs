use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Balance::Table)
                .if_not_exists()
                .col(ColumnDef::new(Balance::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Balance::UserId).string().not_null())
                .col(ColumnDef::new(Balance::Currency).string().not_null())
                .col(ColumnDef::new(Balance::Chain).string().not_null())
                .col(
                    ColumnDef::new(Balance::Total)
                        .decimal_len(36, 18)
                        .not_null()
                        .default("0")
                )
                .col(
                    ColumnDef::new(Balance::Available)
                        .decimal_len(36, 18)
                        .not_null()
                        .default("0")
                )
                .col(
                    ColumnDef::new(Balance::Locked)
                        .decimal_len(36, 18)
                        .not_null()
                        .default("0")
                )
                .col(
                    ColumnDef::new(Balance::Frozen)
                        .decimal_len(36, 18)
                        .not_null()
                        .default("0")
                )
                .col(
                    ColumnDef::new(Balance::UsdValue)
                        .decimal_len(36, 18)
                        .not_null()
                        .default("0")
                )
                .col(
                    ColumnDef::new(Balance::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        // Each ledger row is keyed by (user, currency, chain)
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_balances_user_currency_chain")
                .table(Balance::Table)
                .col(Balance::UserId)
                .col(Balance::Currency)
                .col(Balance::Chain)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Balance::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Balance {
    #[sea_orm(iden = "balance")]
    Table,
    Id,
    UserId,
    Currency,
    Chain,
    Total,
    Available,
    Locked,
    Frozen,
    UsdValue,
    UpdatedAt,
}
