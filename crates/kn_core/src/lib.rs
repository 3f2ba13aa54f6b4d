pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{ChatMessage, CompletionRequest, LanguageModel, NewsSource, Purpose, Role};
pub use storage::ArchiveStorage;
pub use types::{ArchiveRecord, Article, ArticleStatus, Category, NewsItem, NewsQuery};
