use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(ScanWatermark::Table)
                .if_not_exists()
                .col(ColumnDef::new(ScanWatermark::Chain).string().not_null().primary_key())
                .col(ColumnDef::new(ScanWatermark::LastScannedBlock).big_integer().not_null())
                .col(
                    ColumnDef::new(ScanWatermark::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ScanWatermark::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ScanWatermark {
    #[sea_orm(iden = "scan_watermark")]
    Table,
    Chain,
    LastScannedBlock,
    UpdatedAt,
}
