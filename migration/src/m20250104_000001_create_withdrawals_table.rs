use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Withdrawal::Table)
                .if_not_exists()
                .col(ColumnDef::new(Withdrawal::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Withdrawal::UserId).string().not_null())
                .col(ColumnDef::new(Withdrawal::Chain).string().not_null())
                .col(ColumnDef::new(Withdrawal::Currency).string().not_null())
                .col(ColumnDef::new(Withdrawal::Amount).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Withdrawal::Fee).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Withdrawal::NetAmount).decimal_len(36, 18).not_null())
                .col(ColumnDef::new(Withdrawal::FromAddress).string())
                .col(ColumnDef::new(Withdrawal::ToAddress).string().not_null())
                .col(ColumnDef::new(Withdrawal::Status).string().not_null())
                .col(ColumnDef::new(Withdrawal::TxHash).string())
                .col(ColumnDef::new(Withdrawal::TxUrl).string())
                .col(ColumnDef::new(Withdrawal::EmailVerified).boolean().not_null().default(false))
                .col(ColumnDef::new(Withdrawal::Confirmations).integer().not_null().default(0))
                .col(ColumnDef::new(Withdrawal::FailureReason).string())
                .col(ColumnDef::new(Withdrawal::BroadcastAttemptedAt).timestamp_with_time_zone())
                .col(
                    ColumnDef::new(Withdrawal::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Withdrawal::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(ColumnDef::new(Withdrawal::CompletedAt).timestamp_with_time_zone())
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_withdrawals_user")
                .table(Withdrawal::Table)
                .col(Withdrawal::UserId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_withdrawals_status")
                .table(Withdrawal::Table)
                .col(Withdrawal::Status)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Withdrawal::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Withdrawal {
    #[sea_orm(iden = "withdrawal")]
    Table,
    Id,
    UserId,
    Chain,
    Currency,
    Amount,
    Fee,
    NetAmount,
    FromAddress,
    ToAddress,
    Status,
    TxHash,
    TxUrl,
    EmailVerified,
    Confirmations,
    FailureReason,
    BroadcastAttemptedAt,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
