use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::{NewsItem, NewsQuery};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Why a completion is being requested. Used for logging and by offline models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Screening,
    Drafting,
    Critique,
    Revision,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Purpose::Screening => "screening",
            Purpose::Drafting => "drafting",
            Purpose::Critique => "critique",
            Purpose::Revision => "revision",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub purpose: Purpose,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Returns the free-text completion for the conversation in `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Returns the name of the news provider
    fn name(&self) -> &str;

    /// Fetches up to `query.count` current headlines
    async fn fetch_top_headlines(&self, query: &NewsQuery) -> Result<Vec<NewsItem>>;
}
