use async_trait::async_trait;
use chrono::NaiveDate;
use crate::types::ArchiveRecord;
use crate::Result;

#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    /// Store the record of a posted article
    async fn store_record(&self, record: &ArchiveRecord) -> Result<()>;

    /// Get all records archived on a given local day
    async fn get_by_date(&self, date: NaiveDate) -> Result<Vec<ArchiveRecord>>;
}
