use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(WalletAddress::Table)
                .if_not_exists()
                .col(ColumnDef::new(WalletAddress::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(WalletAddress::UserId).string().not_null())
                .col(ColumnDef::new(WalletAddress::Chain).string().not_null())
                .col(ColumnDef::new(WalletAddress::Address).string().not_null())
                .col(
                    ColumnDef::new(WalletAddress::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        // One owner per (chain, address); this is the scanner lookup key
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_wallet_addresses_chain_address")
                .table(WalletAddress::Table)
                .col(WalletAddress::Chain)
                .col(WalletAddress::Address)
                .unique()
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_wallet_addresses_user")
                .table(WalletAddress::Table)
                .col(WalletAddress::UserId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(WalletAddress::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum WalletAddress {
    #[sea_orm(iden = "wallet_address")]
    Table,
    Id,
    UserId,
    Chain,
    Address,
    CreatedAt,
}
