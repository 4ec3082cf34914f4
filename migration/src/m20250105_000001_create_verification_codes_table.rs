use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(VerificationCode::Table)
                .if_not_exists()
                .col(ColumnDef::new(VerificationCode::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(VerificationCode::UserId).string().not_null())
                .col(ColumnDef::new(VerificationCode::Code).string().not_null())
                .col(ColumnDef::new(VerificationCode::Kind).string().not_null())
                .col(ColumnDef::new(VerificationCode::WithdrawalId).uuid())
                .col(
                    ColumnDef::new(VerificationCode::ExpiresAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .col(ColumnDef::new(VerificationCode::Used).boolean().not_null().default(false))
                .col(
                    ColumnDef::new(VerificationCode::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_verification_codes_user_code")
                .table(VerificationCode::Table)
                .col(VerificationCode::UserId)
                .col(VerificationCode::Code)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_verification_codes_withdrawal")
                .table(VerificationCode::Table)
                .col(VerificationCode::WithdrawalId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(VerificationCode::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum VerificationCode {
    #[sea_orm(iden = "verification_code")]
    Table,
    Id,
    UserId,
    Code,
    Kind,
    WithdrawalId,
    ExpiresAt,
    Used,
    CreatedAt,
}
