use chrono::Utc;
use kn_core::{ArchiveRecord, ArchiveStorage, Article, Category, Config, NewsSource, Result};
use kn_inference::{create_model, Editor};
use kn_news::{NewsApiSource, NewsCollector};
use kn_poster::NotePoster;
use kn_storage::create_storage;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Posted { published: bool },
    NoArticle,
    PostFailed,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Posted { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Posted { published: true } => write!(f, "published"),
            RunOutcome::Posted { published: false } => write!(f, "saved as draft"),
            RunOutcome::NoArticle => write!(f, "no article"),
            RunOutcome::PostFailed => write!(f, "posting failed"),
        }
    }
}

/// One daily run: collect news, write the article, post it, archive it.
pub struct Pipeline {
    collector: NewsCollector,
    editor: Editor,
    poster: NotePoster,
    archive: Arc<dyn ArchiveStorage>,
    count: usize,
    category: Category,
}

impl Pipeline {
    pub fn new(
        collector: NewsCollector,
        editor: Editor,
        poster: NotePoster,
        archive: Arc<dyn ArchiveStorage>,
        count: usize,
        category: Category,
    ) -> Self {
        Self { collector, editor, poster, archive, count, category }
    }

    pub fn from_config(config: Arc<Config>, archive_kind: &str) -> Result<Self> {
        let model = create_model(&config)?;
        let editor = Editor::from_config(model, &config);
        let source: Arc<dyn NewsSource> = Arc::new(NewsApiSource::from_config(&config));
        let collector = NewsCollector::from_config(source, editor.clone(), &config);
        let archive = create_storage(archive_kind, &config.archive_dir)?;
        let poster = NotePoster::from_config(config.clone());
        Ok(Self::new(collector, editor, poster, archive, config.news.count, config.news.category))
    }

    pub async fn run(&self) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        async move {
            info!("🚀 Starting news processing and posting");

            let news = match self.collector.collect(self.count, self.category).await {
                Ok(news) if !news.is_empty() => news,
                Ok(_) => {
                    warn!("No suitable news today");
                    return RunOutcome::NoArticle;
                }
                Err(e) => {
                    error!("❌ Failed to collect news: {}", e);
                    return RunOutcome::NoArticle;
                }
            };

            let draft = match self.editor.write_article(&news).await {
                Ok(draft) => draft,
                Err(e) => {
                    error!("❌ Failed to write article: {}", e);
                    return RunOutcome::NoArticle;
                }
            };

            let article = Article::new("", draft.first_draft).with_improved_content(draft.final_revision);
            self.post_and_archive(run_id, article).await
        }
        .instrument(span)
        .await
    }

    /// Posts an existing Markdown document, skipping news and the model.
    pub async fn post_markdown(&self, markdown: &str) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.post_and_archive(run_id, Article::new("", markdown))
            .instrument(span)
            .await
    }

    async fn post_and_archive(&self, run_id: Uuid, mut article: Article) -> RunOutcome {
        info!("📤 Posting content to note.com");
        if !self.poster.post_article(&mut article).await {
            error!("❌ Failed to post article");
            return RunOutcome::PostFailed;
        }

        let record = ArchiveRecord {
            session_id: run_id.to_string(),
            date: Utc::now(),
            article_content: article.body().to_string(),
        };
        if let Err(e) = self.archive.store_record(&record).await {
            warn!("Failed to archive run: {}", e);
        }

        let outcome = RunOutcome::Posted { published: article.is_published() };
        info!("🎉 '{}' {}", article.title, outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kn_core::{Error, NewsItem, NewsQuery};
    use kn_inference::DummyModel;
    use kn_poster::driver::Stage;
    use kn_poster::test_utils::{DriverCall, RecordingDriver};
    use kn_storage::MemoryArchive;
    use std::time::Duration;

    struct StaticSource(Vec<NewsItem>);

    #[async_trait]
    impl NewsSource for StaticSource {
        fn name(&self) -> &str {
            "Static"
        }

        async fn fetch_top_headlines(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
            Ok(self.0.iter().take(query.count).cloned().collect())
        }
    }

    struct DownSource;

    #[async_trait]
    impl NewsSource for DownSource {
        fn name(&self) -> &str {
            "Down"
        }

        async fn fetch_top_headlines(&self, _query: &NewsQuery) -> Result<Vec<NewsItem>> {
            Err(Error::UpstreamData("down".to_string()))
        }
    }

    fn news(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            description: "やさしい話".to_string(),
            content: String::new(),
            url: String::new(),
            published_at: None,
            source: "Static".to_string(),
            category: Category::Science,
        }
    }

    fn pipeline(
        source: Arc<dyn NewsSource>,
        model: Arc<DummyModel>,
        driver: &RecordingDriver,
        archive: Arc<MemoryArchive>,
    ) -> Pipeline {
        let editor = Editor::new(model, 1);
        let collector = NewsCollector::new(source, editor.clone(), true);
        let poster = NotePoster::new(driver.factory(), Duration::ZERO);
        Pipeline::new(collector, editor, poster, archive, 1, Category::Science)
    }

    #[tokio::test]
    async fn test_run_posts_and_archives() {
        let driver = RecordingDriver::new();
        let archive = Arc::new(MemoryArchive::new());
        let source = Arc::new(StaticSource(vec![news("新しい星")]));
        let pipeline = pipeline(source, Arc::new(DummyModel::new()), &driver, archive.clone());

        assert_eq!(pipeline.run().await, RunOutcome::Posted { published: true });

        let records = archive.all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].article_content.contains("## 新しい星"));
        assert!(Uuid::parse_str(&records[0].session_id).is_ok());
        assert!(driver.calls().contains(&DriverCall::SetTitle("きょうのニュース".to_string())));
    }

    #[tokio::test]
    async fn test_revised_draft_is_posted() {
        let driver = RecordingDriver::new().without_publish();
        let archive = Arc::new(MemoryArchive::new());
        let model = Arc::new(DummyModel::scripted([
            "YES",
            "# 初稿\n古い本文",
            "VERDICT: REVISE\nもっとやさしく",
            "# 改訂版\n新しい本文",
            "VERDICT: APPROVE",
        ]));
        let source = Arc::new(StaticSource(vec![news("星")]));
        let pipeline = pipeline(source, model, &driver, archive.clone());

        assert_eq!(pipeline.run().await, RunOutcome::Posted { published: false });
        assert_eq!(driver.inserted_blocks(), vec![("新しい本文".to_string(), false)]);
        assert_eq!(archive.all().await[0].article_content, "# 改訂版\n新しい本文");
    }

    #[tokio::test]
    async fn test_no_news_means_no_article() {
        let driver = RecordingDriver::new();
        let archive = Arc::new(MemoryArchive::new());
        let pipeline = pipeline(Arc::new(DownSource), Arc::new(DummyModel::new()), &driver, archive.clone());

        assert_eq!(pipeline.run().await, RunOutcome::NoArticle);
        assert!(driver.calls().is_empty());
        assert!(archive.is_empty().await);
    }

    #[tokio::test]
    async fn test_all_news_rejected_means_no_article() {
        let driver = RecordingDriver::new();
        let archive = Arc::new(MemoryArchive::new());
        let model = Arc::new(DummyModel::scripted(["NO", "NO"]));
        let source = Arc::new(StaticSource(vec![news("a"), news("b")]));
        let pipeline = pipeline(source, model, &driver, archive);

        assert_eq!(pipeline.run().await, RunOutcome::NoArticle);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_post_is_not_archived() {
        let driver = RecordingDriver::new().failing_at(Stage::Authenticate);
        let archive = Arc::new(MemoryArchive::new());
        let source = Arc::new(StaticSource(vec![news("星")]));
        let pipeline = pipeline(source, Arc::new(DummyModel::new()), &driver, archive.clone());

        assert_eq!(pipeline.run().await, RunOutcome::PostFailed);
        assert!(archive.is_empty().await);
        assert_eq!(driver.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_post_markdown_skips_news_and_model() {
        let driver = RecordingDriver::new();
        let archive = Arc::new(MemoryArchive::new());
        let model = Arc::new(DummyModel::scripted(Vec::<String>::new()));
        let pipeline = pipeline(Arc::new(DownSource), model.clone(), &driver, archive.clone());

        let outcome = pipeline.post_markdown("# 手動の記事\n本文です。").await;
        assert_eq!(outcome, RunOutcome::Posted { published: true });
        assert!(model.requests().is_empty());
        assert_eq!(archive.all().await[0].article_content, "# 手動の記事\n本文です。");
    }
}
