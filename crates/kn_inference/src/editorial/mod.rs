//! Screens news for young readers and turns it into a reviewed article.
//!
//! Drafting, critique and revision share one `Conversation`, so every step
//! sees the news and the earlier drafts.

use chrono::Local;
use kn_core::{ChatMessage, CompletionRequest, Config, Error, LanguageModel, NewsItem, Purpose, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod prompts;

const SCREENING_TEMPERATURE: f32 = 0.0;

/// Reviewer verdict on a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CritiqueDecision {
    Approve,
    Revise { feedback: String },
}

impl CritiqueDecision {
    /// Reads the `VERDICT:` line of a critique. `None` when there is none.
    pub fn parse(critique: &str) -> Option<Self> {
        let mut lines = critique.lines();
        let verdict = lines.by_ref().find_map(|line| {
            let line = line.trim().trim_matches('*').trim();
            let upper = line.to_uppercase();
            upper
                .strip_prefix("VERDICT:")
                .map(|rest| rest.trim().trim_matches('*').trim().to_string())
        })?;

        match verdict.as_str() {
            "APPROVE" => Some(CritiqueDecision::Approve),
            "REVISE" => {
                let rest: Vec<&str> = lines.collect();
                let feedback = rest.join("\n").trim().to_string();
                let feedback = if feedback.is_empty() {
                    critique.trim().to_string()
                } else {
                    feedback
                };
                Some(CritiqueDecision::Revise { feedback })
            }
            _ => None,
        }
    }
}

/// Message history shared by the steps of one article.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system: impl Into<String>) -> Self {
        Self { messages: vec![ChatMessage::system(system)] }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EditorialDraft {
    pub first_draft: String,
    /// Latest revision, when the reviewer asked for one
    pub final_revision: Option<String>,
    pub critiques: Vec<String>,
    pub revisions: u32,
}

impl EditorialDraft {
    pub fn final_text(&self) -> &str {
        self.final_revision.as_deref().unwrap_or(&self.first_draft)
    }
}

#[derive(Debug, Clone)]
pub struct Editor {
    model: Arc<dyn LanguageModel>,
    max_revisions: u32,
    temperature: Option<f32>,
}

impl Editor {
    pub fn new(model: Arc<dyn LanguageModel>, max_revisions: u32) -> Self {
        Self { model, max_revisions, temperature: None }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &Config) -> Self {
        Self {
            model,
            max_revisions: config.editorial.max_revisions,
            temperature: Some(config.llm.temperature),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Whether `item` suits 6 to 8 year olds. Only an answer starting with YES counts.
    pub async fn is_appropriate(&self, item: &NewsItem) -> Result<bool> {
        let request = CompletionRequest {
            purpose: Purpose::Screening,
            messages: vec![ChatMessage::user(prompts::screening(item))],
            temperature: Some(SCREENING_TEMPERATURE),
        };
        let answer = self.model.complete(&request).await?;
        let appropriate = answer.trim_start().to_uppercase().starts_with("YES");
        debug!(appropriate, "Screened '{}'", item.title);
        Ok(appropriate)
    }

    /// Drafts an article from `news`, then critiques and revises it up to `max_revisions` times.
    pub async fn write_article(&self, news: &[NewsItem]) -> Result<EditorialDraft> {
        if news.is_empty() {
            return Err(Error::UpstreamData("no news to write about".to_string()));
        }

        let mut conversation = Conversation::new(prompts::SYSTEM);
        conversation.push_user(format!(
            "{}\n\n{}",
            prompts::news_digest(Local::now().date_naive(), news),
            prompts::DRAFT
        ));

        info!("✍️ Drafting article from {} news items", news.len());
        let first_draft = self.ask(&mut conversation, Purpose::Drafting).await?;
        info!("Draft completed: {} characters", first_draft.chars().count());

        let mut current = first_draft.clone();
        let mut critiques = Vec::new();
        let mut revisions = 0u32;

        loop {
            conversation.push_user(prompts::CRITIQUE);
            let critique = self.ask(&mut conversation, Purpose::Critique).await?;

            let decision = CritiqueDecision::parse(&critique).unwrap_or_else(|| {
                warn!("Critique has no verdict line, treating it as approval");
                CritiqueDecision::Approve
            });
            critiques.push(critique);

            match decision {
                CritiqueDecision::Approve => {
                    info!(revisions, "✅ Article approved");
                    break;
                }
                CritiqueDecision::Revise { feedback } => {
                    if revisions >= self.max_revisions {
                        warn!(
                            max_revisions = self.max_revisions,
                            "Revision limit reached, keeping the latest draft"
                        );
                        break;
                    }
                    info!(revision = revisions + 1, "🔁 Revising: {}", feedback);
                    conversation.push_user(prompts::REVISE);
                    current = self.ask(&mut conversation, Purpose::Revision).await?;
                    revisions += 1;
                }
            }
        }

        Ok(EditorialDraft {
            first_draft,
            final_revision: (revisions > 0).then_some(current),
            critiques,
            revisions,
        })
    }

    async fn ask(&self, conversation: &mut Conversation, purpose: Purpose) -> Result<String> {
        let request = CompletionRequest {
            purpose,
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
        };
        let reply = self.model.complete(&request).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::UpstreamData(format!("{} returned an empty {}", self.model.name(), purpose)));
        }
        conversation.push_assistant(reply);
        Ok(reply.to_string())
    }
}
