//! Process-wide configuration.
//!
//! Built once at startup from `config.json` (or the environment when the file
//! is absent), validated, and then shared read-only as `Arc<Config>`.

use chrono::NaiveTime;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::types::Category;
use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` only when the offline `dummy` provider is selected.
    pub openai_api_key: Option<SecretString>,
    pub news_api_key: SecretString,
    pub note_email: String,
    pub note_password: SecretString,
    pub post_time: NaiveTime,
    pub model: String,
    pub llm: LlmSettings,
    pub news: NewsSettings,
    pub browser: BrowserSettings,
    pub platform: PlatformSettings,
    pub editorial: EditorialSettings,
    pub archive_dir: PathBuf,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub base_url: String,
    pub country: String,
    pub category: Category,
    pub count: usize,
    pub age_appropriate: bool,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org".to_string(),
            country: "jp".to_string(),
            category: Category::General,
            count: 5,
            age_appropriate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    /// When set, this WebDriver server is spawned for each session and killed on teardown.
    pub webdriver_binary: Option<PathBuf>,
    pub headless: bool,
    pub launch_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub publish_probe_secs: u64,
    pub publish_timeout_secs: u64,
    pub quiescence_timeout_secs: u64,
    pub quiescence_idle_ms: u64,
    pub block_pacing_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            webdriver_binary: None,
            headless: true,
            launch_timeout_secs: 15,
            element_timeout_secs: 10,
            publish_probe_secs: 3,
            publish_timeout_secs: 5,
            quiescence_timeout_secs: 30,
            quiescence_idle_ms: 500,
            block_pacing_ms: 500,
        }
    }
}

impl BrowserSettings {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn publish_probe(&self) -> Duration {
        Duration::from_secs(self.publish_probe_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn quiescence_timeout(&self) -> Duration {
        Duration::from_secs(self.quiescence_timeout_secs)
    }

    pub fn quiescence_idle(&self) -> Duration {
        Duration::from_millis(self.quiescence_idle_ms)
    }

    pub fn block_pacing(&self) -> Duration {
        Duration::from_millis(self.block_pacing_ms)
    }
}

/// How to find an element on the publishing platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css={}", s),
            Selector::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// URLs and UI affordances of the target platform. Defaults address note.com.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub login_url: String,
    pub new_document_url: String,
    pub email_field: Selector,
    pub password_field: Selector,
    pub login_button: Selector,
    pub title_field: Selector,
    pub save_button: Selector,
    pub publish_button: Selector,
    pub publish_confirm_button: Selector,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            login_url: "https://note.com/login".to_string(),
            new_document_url: "https://note.com/notes/new".to_string(),
            email_field: Selector::Css("#email".to_string()),
            password_field: Selector::Css("#password".to_string()),
            login_button: Selector::XPath(
                "//button[.//div[contains(normalize-space(.), 'ログイン')]]".to_string(),
            ),
            title_field: Selector::Css(r#"textarea[placeholder="記事タイトル"]"#.to_string()),
            save_button: Selector::XPath("//button[contains(normalize-space(.), '保存')]".to_string()),
            publish_button: Selector::XPath("//button[normalize-space(.)='公開する']".to_string()),
            publish_confirm_button: Selector::XPath(
                "//button[contains(normalize-space(.), '有料記事として公開する')]".to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorialSettings {
    pub max_revisions: u32,
}

impl Default for EditorialSettings {
    fn default() -> Self {
        Self { max_revisions: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub file: Option<PathBuf>,
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("app.log")),
            filter: "info".to_string(),
        }
    }
}

/// The on-disk / environment shape before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    openai_api_key: Option<String>,
    news_api_key: Option<String>,
    note_email: Option<String>,
    note_password: Option<String>,
    post_time: Option<String>,
    model: Option<String>,
    llm: LlmSettings,
    news: NewsSettings,
    browser: BrowserSettings,
    platform: PlatformSettings,
    editorial: EditorialSettings,
    archive_dir: Option<PathBuf>,
    log: LogSettings,
}

impl RawConfig {
    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Configuration(format!("Invalid configuration file {}: {}", path.display(), e))
        })
    }

    fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut raw = RawConfig {
            openai_api_key: lookup("OPENAI_API_KEY"),
            news_api_key: lookup("NEWS_API_KEY"),
            note_email: lookup("NOTE_EMAIL"),
            note_password: lookup("NOTE_PASSWORD"),
            post_time: lookup("POST_TIME"),
            model: lookup("OPENAI_MODEL"),
            archive_dir: lookup("ARCHIVE_DIR").map(PathBuf::from),
            ..RawConfig::default()
        };

        if let Some(provider) = lookup("LLM_PROVIDER") {
            raw.llm.provider = provider;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            raw.llm.base_url = url;
        }
        if let Some(url) = lookup("NEWS_API_BASE_URL") {
            raw.news.base_url = url;
        }
        if let Some(country) = lookup("NEWS_COUNTRY") {
            raw.news.country = country;
        }
        if let Some(category) = lookup("NEWS_CATEGORY") {
            raw.news.category = category.parse().map_err(Error::Configuration)?;
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            raw.browser.webdriver_url = url;
        }
        if let Some(binary) = lookup("WEBDRIVER_BINARY") {
            raw.browser.webdriver_binary = Some(PathBuf::from(binary));
        }
        if let Some(headless) = lookup("BROWSER_HEADLESS") {
            raw.browser.headless = parse_bool("BROWSER_HEADLESS", &headless)?;
        }
        if let Some(file) = lookup("LOG_FILE") {
            raw.log.file = if file.is_empty() { None } else { Some(PathBuf::from(file)) };
        }
        Ok(raw)
    }

    fn validate(self) -> Result<Config> {
        let offline = self.llm.provider == "dummy";
        let openai_api_key = match non_empty(self.openai_api_key) {
            Some(key) => Some(SecretString::new(key)),
            None if offline => None,
            None => return Err(missing("openai_api_key")),
        };
        let news_api_key = non_empty(self.news_api_key).ok_or_else(|| missing("news_api_key"))?;
        let note_email = non_empty(self.note_email).ok_or_else(|| missing("note_email"))?;
        let note_password = non_empty(self.note_password).ok_or_else(|| missing("note_password"))?;

        let post_time = self.post_time.unwrap_or_else(|| "08:00".to_string());
        let post_time = NaiveTime::parse_from_str(post_time.trim(), "%H:%M").map_err(|_| {
            Error::Configuration(format!("Invalid post_time '{}', expected HH:MM", post_time))
        })?;

        if self.news.count == 0 {
            return Err(Error::Configuration("news.count must be at least 1".to_string()));
        }

        Ok(Config {
            openai_api_key,
            news_api_key: SecretString::new(news_api_key),
            note_email,
            note_password: SecretString::new(note_password),
            post_time,
            model: non_empty(self.model).unwrap_or_else(|| "gpt-4o".to_string()),
            llm: self.llm,
            news: self.news,
            browser: self.browser,
            platform: self.platform,
            editorial: self.editorial,
            archive_dir: self.archive_dir.unwrap_or_else(|| PathBuf::from("archives")),
            log: self.log,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing(key: &str) -> Error {
    Error::Configuration(format!("Missing required configuration: {}", key))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::Configuration(format!("Invalid boolean for {}: {}", key, other))),
    }
}

impl Config {
    /// Loads `.env`, then the JSON file at `path` if it exists, else the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();
        let raw = if path.exists() {
            tracing::debug!("Reading configuration from {}", path.display());
            RawConfig::from_file(path)?
        } else {
            tracing::debug!("{} not found, reading configuration from environment", path.display());
            RawConfig::from_env(|key| std::env::var(key).ok())?
        };
        raw.validate()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("Invalid configuration: {}", e)))?;
        raw.validate()
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        RawConfig::from_env(lookup)?.validate()
    }
}
