use chrono::Utc;
use futures::FutureExt;
use kn_core::{Article, Config};
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::driver::{DriverError, DriverFactory, PublishOutcome, PublishingDriver, WebDriverSession};
use crate::markdown::{self, ParsedArticle};

/// Posts one article per call through a freshly created driver session.
pub struct NotePoster {
    factory: DriverFactory,
    block_pacing: Duration,
}

impl NotePoster {
    pub fn new(factory: DriverFactory, block_pacing: Duration) -> Self {
        Self { factory, block_pacing }
    }

    /// A poster driving a real browser through WebDriver
    pub fn from_config(config: Arc<Config>) -> Self {
        let pacing = config.browser.block_pacing();
        Self::new(WebDriverSession::factory(config), pacing)
    }

    /// Returns true once the document was saved, whether or not it could be published.
    ///
    /// On success a published article is marked as such and an empty title is
    /// filled from the Markdown. On failure the article is left untouched. The
    /// session is torn down on every path, a panic included.
    pub async fn post_article(&self, article: &mut Article) -> bool {
        let parsed = markdown::parse(article.body());
        info!("📝 Posting '{}' ({} blocks)", parsed.title, parsed.blocks.len());

        let mut driver = (self.factory)();
        let result = AssertUnwindSafe(self.drive(driver.as_mut(), &parsed))
            .catch_unwind()
            .await;
        driver.teardown().await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(stage = %e.stage(), "❌ Posting failed: {}", e);
                return false;
            }
            Err(panic) => resume_unwind(panic),
        };

        if article.title.is_empty() {
            article.title = parsed.title;
        }
        match outcome {
            PublishOutcome::Published => {
                article.mark_published(Utc::now());
                info!("✅ Published '{}'", article.title);
            }
            PublishOutcome::Draft => info!("✅ Saved '{}' as draft", article.title),
        }
        true
    }

    async fn drive(
        &self,
        driver: &mut dyn PublishingDriver,
        parsed: &ParsedArticle,
    ) -> Result<PublishOutcome, DriverError> {
        driver.launch().await?;
        driver.authenticate().await?;
        driver.open_editor().await?;
        driver.set_title(&parsed.title).await?;

        for (i, block) in parsed.blocks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.block_pacing).await;
            }
            driver.insert_block(&block.text, block.is_heading()).await?;
        }

        driver.save().await?;

        match driver.publish_if_available().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(stage = %e.stage(), "⚠️ Publishing failed, keeping the saved draft: {}", e);
                Ok(PublishOutcome::Draft)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Stage;
    use crate::test_utils::{DriverCall, RecordingDriver};
    use kn_core::ArticleStatus;

    const MARKDOWN: &str =
        "# My Title\n\nIntro text.\n\n## Section One\nBody one.\n\n## Section Two\nBody two.";

    fn poster(driver: &RecordingDriver) -> NotePoster {
        NotePoster::new(driver.factory(), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_full_sequence_publishes() {
        let driver = RecordingDriver::new();
        let mut article = Article::new("", MARKDOWN);

        assert!(poster(&driver).post_article(&mut article).await);
        assert!(article.is_published());
        assert!(article.published_at().is_some());
        assert_eq!(article.title, "My Title");

        let block = |text: &str, as_heading| DriverCall::InsertBlock { text: text.to_string(), as_heading };
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Launch,
                DriverCall::Authenticate,
                DriverCall::OpenEditor,
                DriverCall::SetTitle("My Title".to_string()),
                block("Intro text.", false),
                block("## Section One", true),
                block("Body one.", false),
                block("## Section Two", true),
                block("Body two.", false),
                DriverCall::Save,
                DriverCall::Publish,
                DriverCall::Teardown,
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_unavailable_keeps_draft() {
        let driver = RecordingDriver::new().without_publish();
        let mut article = Article::new("", MARKDOWN);

        assert!(poster(&driver).post_article(&mut article).await);
        assert_eq!(article.status(), ArticleStatus::Draft);
        assert!(article.published_at().is_none());
        assert_eq!(driver.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_error_is_downgraded_to_draft() {
        let driver = RecordingDriver::new().failing_at(Stage::Publish);
        let mut article = Article::new("", MARKDOWN);

        assert!(poster(&driver).post_article(&mut article).await);
        assert_eq!(article.status(), ArticleStatus::Draft);
        assert_eq!(driver.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_leaves_article_untouched() {
        let driver = RecordingDriver::new().failing_at(Stage::Authenticate);
        let mut article = Article::new("", MARKDOWN);
        let before = article.clone();

        assert!(!poster(&driver).post_article(&mut article).await);
        assert_eq!(article, before);
        assert_eq!(
            driver.calls(),
            vec![DriverCall::Launch, DriverCall::Authenticate, DriverCall::Teardown]
        );
    }

    #[tokio::test]
    async fn test_save_failure_returns_false() {
        let driver = RecordingDriver::new().failing_at(Stage::Save);
        let mut article = Article::new("", MARKDOWN);

        assert!(!poster(&driver).post_article(&mut article).await);
        assert!(article.title.is_empty());
        assert!(!driver.calls().contains(&DriverCall::Publish));
        assert_eq!(driver.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_title_is_kept() {
        let driver = RecordingDriver::new();
        let mut article = Article::new("Chosen title", MARKDOWN);

        assert!(poster(&driver).post_article(&mut article).await);
        assert_eq!(article.title, "Chosen title");
        assert!(driver.calls().contains(&DriverCall::SetTitle("My Title".to_string())));
    }

    #[tokio::test]
    async fn test_revised_content_is_posted() {
        let driver = RecordingDriver::new();
        let mut article = Article::new("", "# First draft\nOld.")
            .with_improved_content(Some("# Revised\nNew.".to_string()));

        assert!(poster(&driver).post_article(&mut article).await);
        assert_eq!(article.title, "Revised");
        assert_eq!(driver.inserted_blocks(), vec![("New.".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_untitled_markdown_uses_placeholder() {
        let driver = RecordingDriver::new();
        let mut article = Article::new("", "#### Not A Real Heading\ntext");

        assert!(poster(&driver).post_article(&mut article).await);
        assert_eq!(article.title, markdown::UNTITLED_TITLE);
        assert_eq!(
            driver.inserted_blocks(),
            vec![("#### Not A Real Heading\ntext".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_panic_still_tears_down() {
        let driver = RecordingDriver::new().panicking_at(Stage::InsertBlock);
        let poster = poster(&driver);
        let mut article = Article::new("", MARKDOWN);

        let result = AssertUnwindSafe(poster.post_article(&mut article)).catch_unwind().await;
        assert!(result.is_err());
        assert_eq!(driver.calls().last(), Some(&DriverCall::Teardown));
        assert!(article.title.is_empty());
    }

    #[tokio::test]
    async fn test_each_post_gets_a_fresh_session() {
        let driver = RecordingDriver::new().without_publish();
        let poster = poster(&driver);

        let mut first = Article::new("", MARKDOWN);
        let mut second = Article::new("", MARKDOWN);
        assert!(poster.post_article(&mut first).await);
        assert!(poster.post_article(&mut second).await);
        assert_eq!(driver.teardown_count(), 2);
    }
}
