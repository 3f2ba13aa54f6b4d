use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use kn_core::{ArchiveRecord, ArchiveStorage, Result};
use tokio::sync::RwLock;

/// In-process archive for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    records: RwLock<Vec<ArchiveRecord>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<ArchiveRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ArchiveStorage for MemoryArchive {
    async fn store_record(&self, record: &ArchiveRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Vec<ArchiveRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.date.with_timezone(&Local).date_naive() == date)
            .cloned()
            .collect())
    }
}
