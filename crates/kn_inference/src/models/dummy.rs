use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use kn_core::{CompletionRequest, Error, LanguageModel, Purpose, Result, Role};

/// Offline model. Answers by purpose, or replays a fixed script.
pub struct DummyModel {
    script: Option<Mutex<VecDeque<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel")
            .field("scripted", &self.script.is_some())
            .finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self {
            script: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `replies` in order; running out is an error.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Some(Mutex::new(replies.into_iter().map(Into::into).collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_scripted(script: &Mutex<VecDeque<String>>) -> Result<String> {
        script
            .lock()
            .map_err(|_| Error::Inference("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| Error::Inference("DummyModel script exhausted".to_string()))
    }
}

#[async_trait::async_trait]
impl LanguageModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(script) = &self.script {
            return Self::next_scripted(script);
        }

        Ok(match request.purpose {
            Purpose::Screening => "YES - 子どもにも分かりやすい話題です。".to_string(),
            Purpose::Critique => "VERDICT: APPROVE\n対象年齢に合った内容です。".to_string(),
            Purpose::Drafting | Purpose::Revision => draft_from(request),
        })
    }
}

/// Builds a small article with one section per news title found in the conversation.
fn draft_from(request: &CompletionRequest) -> String {
    let titles: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .flat_map(|m| m.content.lines())
        .filter_map(|line| line.trim().strip_prefix("タイトル:"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(3)
        .collect();

    let mut article = String::from("# きょうのニュース\n\nきょうも せかいで いろいろな ことが ありました。\n");
    if titles.is_empty() {
        article.push_str("\n## おしらせ\nきょうは しょうかい できる ニュースが ありませんでした。\n");
    }
    for title in &titles {
        article.push_str(&format!("\n## {}\nこの ニュースを やさしく せつめい します。\n", title));
    }
    article.push_str("\n## まとめ\nまた あした いっしょに ニュースを よみましょう。");
    article
}
