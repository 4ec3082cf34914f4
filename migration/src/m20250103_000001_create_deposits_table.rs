use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Deposit::Table)
                .if_not_exists()
                .col(ColumnDef::new(Deposit::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Deposit::UserId).string().not_null())
                .col(ColumnDef::new(Deposit::Chain).string().not_null())
                .col(ColumnDef::new(Deposit::Currency).string().not_null())
                .col(ColumnDef::new(Deposit::TxHash).string().not_null())
                .col(ColumnDef::new(Deposit::EventIndex).big_integer().not_null())
                .col(ColumnDef::new(Deposit::FromAddress).string().not_null())
                .col(ColumnDef::new(Deposit::ToAddress).string().not_null())
                .col(ColumnDef::new(Deposit::Amount).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Deposit::Fee).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Deposit::NetAmount).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Deposit::Confirmations).integer().not_null().default(0))
                .col(ColumnDef::new(Deposit::RequiredConfirmations).integer().not_null())
                .col(ColumnDef::new(Deposit::Status).string().not_null())
                .col(ColumnDef::new(Deposit::BlockNumber).big_integer())
                .col(
                    ColumnDef::new(Deposit::SubmittedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(ColumnDef::new(Deposit::ConfirmedAt).timestamp_with_time_zone())
                .col(ColumnDef::new(Deposit::CompletedAt).timestamp_with_time_zone())
                .to_owned()
        ).await?;

        // The dedup key. The database rejects a second insert of the same
        // chain event, so racing scanner ticks cannot double-credit.
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_deposits_chain_tx_event")
                .table(Deposit::Table)
                .col(Deposit::Chain)
                .col(Deposit::TxHash)
                .col(Deposit::EventIndex)
                .unique()
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_deposits_user")
                .table(Deposit::Table)
                .col(Deposit::UserId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_deposits_chain_status")
                .table(Deposit::Table)
                .col(Deposit::Chain)
                .col(Deposit::Status)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Deposit::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Deposit {
    #[sea_orm(iden = "deposit")]
    Table,
    Id,
    UserId,
    Chain,
    Currency,
    TxHash,
    EventIndex,
    FromAddress,
    ToAddress,
    Amount,
    Fee,
    NetAmount,
    Confirmations,
    RequiredConfirmations,
    Status,
    BlockNumber,
    SubmittedAt,
    ConfirmedAt,
    CompletedAt,
}
