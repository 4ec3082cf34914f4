pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_wallet_addresses_table;
mod m20250102_000001_create_balances_table;
mod m20250103_000001_create_deposits_table;
mod m20250104_000001_create_withdrawals_table;
mod m20250105_000001_create_verification_codes_table;
mod m20250106_000001_create_scan_watermarks_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_wallet_addresses_table::Migration),
            Box::new(m20250102_000001_create_balances_table::Migration),
            Box::new(m20250103_000001_create_deposits_table::Migration),
            Box::new(m20250104_000001_create_withdrawals_table::Migration),
            Box::new(m20250105_000001_create_verification_codes_table::Migration),
            Box::new(m20250106_000001_create_scan_watermarks_table::Migration)
        ]
    }
}
