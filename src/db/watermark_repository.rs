use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ DatabaseConnection, EntityTrait, Set };

use crate::db::entity::{ scan_watermark, ScanWatermark };
use crate::enums::Chain;
use crate::error::Result;

pub struct WatermarkRepository {
    db: DatabaseConnection,
}

impl WatermarkRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, chain: Chain) -> Result<Option<i64>> {
        let record = ScanWatermark::find_by_id(chain.as_str()).one(&self.db).await?;
        Ok(record.map(|r| r.last_scanned_block))
    }

    /// Advance the watermark. Never moves backwards: a concurrent or
    /// repeated tick with an older height is a no-op.
    pub async fn advance(&self, chain: Chain, height: i64) -> Result<()> {
        if let Some(current) = self.get(chain).await? {
            if current >= height {
                return Ok(());
            }
        }

        let record = scan_watermark::ActiveModel {
            chain: Set(chain.as_str().to_string()),
            last_scanned_block: Set(height),
            updated_at: Set(Utc::now()),
        };

        ScanWatermark::insert(record)
            .on_conflict(
                OnConflict::column(scan_watermark::Column::Chain)
                    .update_columns([
                        scan_watermark::Column::LastScannedBlock,
                        scan_watermark::Column::UpdatedAt,
                    ])
                    .to_owned()
            )
            .exec(&self.db).await?;

        Ok(())
    }
}
