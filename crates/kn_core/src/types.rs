use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleStatus::Draft => write!(f, "draft"),
            ArticleStatus::Published => write!(f, "published"),
        }
    }
}

/// One article moving through the pipeline.
///
/// `published_at` is set if and only if `status` is `Published`; both are only
/// changed through [`Article::mark_published`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArticleRecord")]
pub struct Article {
    pub title: String,
    content: String,
    status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    pub improved_content: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            status: ArticleStatus::Draft,
            created_at: Utc::now(),
            published_at: None,
            improved_content: None,
        }
    }

    pub fn with_improved_content(mut self, improved: Option<String>) -> Self {
        self.improved_content = improved;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The text that gets posted: the revised draft when there is one.
    pub fn body(&self) -> &str {
        self.improved_content.as_deref().unwrap_or(&self.content)
    }

    pub fn status(&self) -> ArticleStatus {
        self.status
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    pub fn mark_published(&mut self, at: DateTime<Utc>) {
        self.status = ArticleStatus::Published;
        self.published_at = Some(at);
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Article(title='{}', status='{}')", self.title, self.status)
    }
}

#[derive(Deserialize)]
struct ArticleRecord {
    title: String,
    content: String,
    #[serde(default = "default_status")]
    status: ArticleStatus,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    improved_content: Option<String>,
}

fn default_status() -> ArticleStatus {
    ArticleStatus::Draft
}

impl TryFrom<ArticleRecord> for Article {
    type Error = String;

    fn try_from(record: ArticleRecord) -> std::result::Result<Self, Self::Error> {
        let published = record.status == ArticleStatus::Published;
        if published != record.published_at.is_some() {
            return Err(format!(
                "article '{}' has status {} but published_at is {}",
                record.title,
                record.status,
                if record.published_at.is_some() { "set" } else { "missing" }
            ));
        }
        Ok(Self {
            title: record.title,
            content: record.content,
            status: record.status,
            created_at: record.created_at,
            published_at: record.published_at,
            improved_content: record.improved_content,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Business,
    Entertainment,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Category::General),
            "business" => Ok(Category::Business),
            "entertainment" => Ok(Category::Entertainment),
            "health" => Ok(Category::Health),
            "science" => Ok(Category::Science),
            "sports" => Ok(Category::Sports),
            "technology" => Ok(Category::Technology),
            other => Err(format!("Unknown news category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsQuery {
    pub count: usize,
    pub category: Category,
}

/// What gets written to the archive after a successful post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub article_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_article_is_draft() {
        let article = Article::new("", "# Title\nbody");
        assert_eq!(article.status(), ArticleStatus::Draft);
        assert!(article.published_at().is_none());
        assert_eq!(article.body(), "# Title\nbody");
        assert_eq!(article.to_string(), "Article(title='', status='draft')");
    }

    #[test]
    fn test_improved_content_overrides_body() {
        let article = Article::new("t", "first").with_improved_content(Some("second".to_string()));
        assert_eq!(article.content(), "first");
        assert_eq!(article.body(), "second");
    }

    #[test]
    fn test_mark_published_sets_both_fields() {
        let mut article = Article::new("t", "c");
        let now = Utc::now();
        article.mark_published(now);
        assert!(article.is_published());
        assert_eq!(article.published_at(), Some(now));
    }

    #[test]
    fn test_article_serde_keeps_invariant() {
        let mut article = Article::new("t", "c");
        article.mark_published(Utc::now());
        let json = serde_json::to_string(&article).unwrap();
        let back: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(back, article);

        let broken = r#"{"title":"t","content":"c","status":"published","published_at":null}"#;
        assert!(serde_json::from_str::<Article>(broken).is_err());

        let broken = r#"{"title":"t","content":"c","status":"draft","published_at":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Article>(broken).is_err());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Science".parse::<Category>().unwrap(), Category::Science);
        assert!("weather".parse::<Category>().is_err());
        assert_eq!(Category::Technology.to_string(), "technology");
    }
}
