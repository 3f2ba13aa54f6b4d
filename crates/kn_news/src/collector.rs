use std::sync::Arc;
use kn_core::{Category, Config, NewsItem, NewsQuery, NewsSource, Result};
use kn_inference::Editor;
use tracing::{info, warn};

/// Upper bound on headlines requested from the source in one run.
const MAX_FETCH: usize = 20;

/// Fetches headlines and keeps the ones fit for young readers.
pub struct NewsCollector {
    source: Arc<dyn NewsSource>,
    editor: Editor,
    age_appropriate: bool,
}

impl NewsCollector {
    pub fn new(source: Arc<dyn NewsSource>, editor: Editor, age_appropriate: bool) -> Self {
        Self { source, editor, age_appropriate }
    }

    pub fn from_config(source: Arc<dyn NewsSource>, editor: Editor, config: &Config) -> Self {
        Self::new(source, editor, config.news.age_appropriate)
    }

    /// Returns at most `count` items. Twice as many are fetched to leave room for screening.
    pub async fn collect(&self, count: usize, category: Category) -> Result<Vec<NewsItem>> {
        let query = NewsQuery {
            count: (count * 2).min(MAX_FETCH),
            category,
        };
        let fetched = self.source.fetch_top_headlines(&query).await?;
        info!("📥 {} returned {} headlines", self.source.name(), fetched.len());

        if !self.age_appropriate {
            return Ok(fetched.into_iter().take(count).collect());
        }

        let mut selected = Vec::with_capacity(count);
        for item in fetched {
            if selected.len() >= count {
                break;
            }
            match self.editor.is_appropriate(&item).await {
                Ok(true) => selected.push(item),
                Ok(false) => info!("🚫 Skipping '{}'", item.title),
                Err(e) => warn!("Failed to screen '{}': {}", item.title, e),
            }
        }

        info!("✅ Selected {} of {} requested items", selected.len(), count);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kn_core::Error;
    use kn_inference::DummyModel;
    use std::sync::Mutex;

    struct StaticSource {
        items: Vec<NewsItem>,
        queries: Mutex<Vec<NewsQuery>>,
    }

    impl StaticSource {
        fn with_titles(titles: &[&str]) -> Arc<Self> {
            let items = titles
                .iter()
                .map(|t| NewsItem {
                    title: t.to_string(),
                    description: String::new(),
                    content: String::new(),
                    url: String::new(),
                    published_at: None,
                    source: "Static".to_string(),
                    category: Category::General,
                })
                .collect();
            Arc::new(Self { items, queries: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl NewsSource for StaticSource {
        fn name(&self) -> &str {
            "Static"
        }

        async fn fetch_top_headlines(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
            self.queries.lock().unwrap().push(*query);
            Ok(self.items.iter().take(query.count).cloned().collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl NewsSource for FailingSource {
        fn name(&self) -> &str {
            "Failing"
        }

        async fn fetch_top_headlines(&self, _query: &NewsQuery) -> Result<Vec<NewsItem>> {
            Err(Error::UpstreamData("down".to_string()))
        }
    }

    fn titles(items: &[NewsItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_requests_double_capped_at_twenty() {
        let source = StaticSource::with_titles(&["a"]);
        let editor = Editor::new(Arc::new(DummyModel::new()), 1);
        let collector = NewsCollector::new(source.clone(), editor, false);

        collector.collect(3, Category::Science).await.unwrap();
        collector.collect(15, Category::Science).await.unwrap();

        let queries = source.queries.lock().unwrap().clone();
        assert_eq!(queries[0].count, 6);
        assert_eq!(queries[0].category, Category::Science);
        assert_eq!(queries[1].count, 20);
    }

    #[tokio::test]
    async fn test_screening_keeps_appropriate_items() {
        let source = StaticSource::with_titles(&["a", "b", "c", "d"]);
        let model = Arc::new(DummyModel::scripted(["NO", "YES", "YES"]));
        let collector = NewsCollector::new(source, Editor::new(model.clone(), 1), true);

        let items = collector.collect(2, Category::General).await.unwrap();
        assert_eq!(titles(&items), vec!["b", "c"]);
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_screening_error_skips_item() {
        let source = StaticSource::with_titles(&["a", "b"]);
        // the script runs out on the second item
        let model = Arc::new(DummyModel::scripted(["YES"]));
        let collector = NewsCollector::new(source, Editor::new(model, 1), true);

        let items = collector.collect(2, Category::General).await.unwrap();
        assert_eq!(titles(&items), vec!["a"]);
    }

    #[tokio::test]
    async fn test_without_filtering_truncates() {
        let source = StaticSource::with_titles(&["a", "b", "c"]);
        let model = Arc::new(DummyModel::scripted(Vec::<String>::new()));
        let collector = NewsCollector::new(source, Editor::new(model.clone(), 1), false);

        let items = collector.collect(2, Category::General).await.unwrap();
        assert_eq!(titles(&items), vec!["a", "b"]);
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let editor = Editor::new(Arc::new(DummyModel::new()), 1);
        let collector = NewsCollector::new(Arc::new(FailingSource), editor, true);
        assert!(collector.collect(5, Category::General).await.is_err());
    }
}
