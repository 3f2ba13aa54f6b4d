use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use kn_core::{ArchiveRecord, ArchiveStorage, Error, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One pretty-printed JSON array per local day, `archive_YYYYMMDD.json`.
#[derive(Debug)]
pub struct FileArchive {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("archive_{}.json", date.format("%Y%m%d")))
    }

    async fn read_day(&self, path: &Path) -> Result<Vec<ArchiveRecord>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                Error::Storage(format!("Corrupt archive {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArchiveStorage for FileArchive {
    async fn store_record(&self, record: &ArchiveRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let day = record.date.with_timezone(&Local).date_naive();
        let path = self.path_for(day);

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut records = self.read_day(&path).await?;
        records.push(record.clone());

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&records)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!("🗄️ Archived session {} to {}", record.session_id, path.display());
        Ok(())
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Vec<ArchiveRecord>> {
        let path = self.path_for(date);
        debug!("Reading archive {}", path.display());
        self.read_day(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> ArchiveRecord {
        ArchiveRecord {
            session_id: id.to_string(),
            date: Utc::now(),
            article_content: "# きょうのニュース\n本文".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_day_appends() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileArchive::new(dir.path().join("archives"));

        archive.store_record(&record("first")).await.unwrap();
        archive.store_record(&record("second")).await.unwrap();

        let today = Local::now().date_naive();
        let path = archive.path_for(today);
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("archive_"));

        let records = archive.get_by_date(today).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(records[0].article_content, "# きょうのニュース\n本文");
    }

    #[test]
    fn test_file_name_uses_day() {
        let archive = FileArchive::new("archives");
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(archive.path_for(date), PathBuf::from("archives/archive_20240401.json"));
    }

    #[tokio::test]
    async fn test_missing_day_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileArchive::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(archive.get_by_date(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileArchive::new(dir.path());
        let path = archive.path_for(Local::now().date_naive());
        std::fs::write(&path, "not json").unwrap();

        let err = archive.store_record(&record("x")).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }
}
