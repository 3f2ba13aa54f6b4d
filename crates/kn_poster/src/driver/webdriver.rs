//! `PublishingDriver` over a W3C WebDriver server (chromedriver or geckodriver).
//!
//! Every session is a new WebDriver session, so the browser profile is fresh and
//! nothing is shared between runs. When a WebDriver binary is configured the
//! server process is spawned per session and killed on teardown.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use kn_core::config::{BrowserSettings, PlatformSettings, Selector};
use kn_core::Config;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    confirm_presses, DriverError, DriverFactory, PublishOutcome, PublishingDriver, SessionState, Stage,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Inserts text at the caret as a single edit, like a paste.
const INSERT_TEXT_JS: &str = "return document.execCommand('insertText', false, arguments[0]);";

const NETWORK_SNAPSHOT_JS: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

pub struct WebDriverSession {
    browser: BrowserSettings,
    platform: PlatformSettings,
    email: String,
    password: SecretString,
    state: SessionState,
    client: Option<Client>,
    server: Option<Child>,
}

impl fmt::Debug for WebDriverSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDriverSession")
            .field("webdriver_url", &self.browser.webdriver_url)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("state", &self.state)
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl WebDriverSession {
    pub fn new(config: &Config) -> Self {
        Self {
            browser: config.browser.clone(),
            platform: config.platform.clone(),
            email: config.note_email.clone(),
            password: config.note_password.clone(),
            state: SessionState::Closed,
            client: None,
            server: None,
        }
    }

    /// A factory that opens a fresh session for every posting run.
    pub fn factory(config: Arc<Config>) -> DriverFactory {
        Box::new(move || -> Box<dyn PublishingDriver> { Box::new(WebDriverSession::new(&config)) })
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut chrome_args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--window-size=1280,1800",
            "--lang=ja-JP",
        ];
        let mut firefox_args = Vec::new();
        if self.browser.headless {
            chrome_args.push("--headless=new");
            firefox_args.push("-headless");
        }

        let mut caps = Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
        caps
    }

    fn client(&self, stage: Stage) -> Result<Client, DriverError> {
        self.client
            .clone()
            .ok_or(DriverError::InvalidState { stage, state: self.state })
    }

    async fn spawn_server(&mut self, binary: &Path) -> Result<(), DriverError> {
        let port = webdriver_port(&self.browser.webdriver_url).ok_or_else(|| DriverError::Launch {
            stage: Stage::Launch,
            message: format!("no port in webdriver url {}", self.browser.webdriver_url),
        })?;

        debug!("Spawning {} on port {}", binary.display(), port);
        let child = Command::new(binary)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Launch {
                stage: Stage::Launch,
                message: format!("failed to start {}: {}", binary.display(), e),
            })?;
        self.server = Some(child);

        let limit = self.browser.launch_timeout();
        timeout(limit, async {
            while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| DriverError::timeout(Stage::Launch, format!("webdriver port {}", port), limit))
    }

    async fn wait_for(
        &self,
        stage: Stage,
        selector: &Selector,
        limit: Duration,
    ) -> Result<Element, DriverError> {
        let client = self.client(stage)?;
        client
            .wait()
            .at_most(limit)
            .every(POLL_INTERVAL)
            .for_element(locator(selector))
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => DriverError::timeout(stage, selector.to_string(), limit),
                other => DriverError::command(stage, other),
            })
    }

    /// Waits until the document is complete and no new resources load for the idle window.
    async fn wait_for_quiescence(&self, stage: Stage) -> Result<(), DriverError> {
        let client = self.client(stage)?;
        let limit = self.browser.quiescence_timeout();
        let idle = self.browser.quiescence_idle();
        let deadline = Instant::now() + limit;
        let mut last_count: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            let snapshot = client
                .execute(NETWORK_SNAPSHOT_JS, vec![])
                .await
                .map_err(|e| DriverError::command(stage, e))?;
            let complete = snapshot[0].as_str() == Some("complete");
            let count = snapshot[1].as_u64().unwrap_or(0);
            let now = Instant::now();

            if complete && last_count == Some(count) {
                if now.duration_since(stable_since) >= idle {
                    return Ok(());
                }
            } else {
                last_count = complete.then_some(count);
                stable_since = now;
            }

            if now >= deadline {
                return Err(DriverError::timeout(stage, "network quiescence", limit));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until_left(&self, stage: Stage, url_prefix: &str) -> Result<(), DriverError> {
        let client = self.client(stage)?;
        let limit = self.browser.element_timeout();
        let deadline = Instant::now() + limit;
        loop {
            let current = client
                .current_url()
                .await
                .map_err(|e| DriverError::command(stage, e))?;
            if !current.as_str().starts_with(url_prefix) {
                debug!("Left login page, now at {}", current);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout(stage, "redirect away from the login page", limit));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PublishingDriver for WebDriverSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn launch(&mut self) -> Result<(), DriverError> {
        self.state.transition(SessionState::Launching, Stage::Launch)?;
        info!("🚀 Launching browser session via {}", self.browser.webdriver_url);

        if let Some(binary) = self.browser.webdriver_binary.clone() {
            self.spawn_server(&binary).await?;
        }

        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let limit = self.browser.launch_timeout();
        let client = timeout(limit, builder.connect(&self.browser.webdriver_url))
            .await
            .map_err(|_| DriverError::timeout(Stage::Launch, "a new WebDriver session", limit))?
            .map_err(|e| DriverError::Launch { stage: Stage::Launch, message: e.to_string() })?;

        self.client = Some(client);
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), DriverError> {
        let stage = Stage::Authenticate;
        self.state.transition(SessionState::Authenticating, stage)?;
        let client = self.client(stage)?;
        let element_timeout = self.browser.element_timeout();
        let login_url = self.platform.login_url.clone();

        info!("🔐 Logging in as {}", self.email);
        client.goto(&login_url).await.map_err(|e| DriverError::command(stage, e))?;

        let email = self.wait_for(stage, &self.platform.email_field, element_timeout).await?;
        let password = self.wait_for(stage, &self.platform.password_field, element_timeout).await?;
        self.wait_for_quiescence(stage).await?;

        email.send_keys(&self.email).await.map_err(|e| DriverError::command(stage, e))?;
        password
            .send_keys(self.password.expose_secret())
            .await
            .map_err(|e| DriverError::command(stage, e))?;

        let submit = self.wait_for(stage, &self.platform.login_button, element_timeout).await?;
        submit.click().await.map_err(|e| DriverError::command(stage, e))?;
        self.wait_for_quiescence(stage).await?;
        self.wait_until_left(stage, &login_url).await?;

        self.state.transition(SessionState::Ready, stage)?;
        info!("✅ Logged in");
        Ok(())
    }

    async fn open_editor(&mut self) -> Result<(), DriverError> {
        let stage = Stage::OpenEditor;
        self.state.transition(SessionState::Editing, stage)?;
        let client = self.client(stage)?;

        debug!("Opening editor at {}", self.platform.new_document_url);
        client
            .goto(&self.platform.new_document_url)
            .await
            .map_err(|e| DriverError::command(stage, e))?;
        self.wait_for_quiescence(stage).await
    }

    async fn set_title(&mut self, title: &str) -> Result<(), DriverError> {
        let stage = Stage::SetTitle;
        self.state.ensure(SessionState::Editing, stage)?;

        let field = self.wait_for(stage, &self.platform.title_field, self.browser.element_timeout()).await?;
        field.clear().await.map_err(|e| DriverError::command(stage, e))?;
        field.send_keys(title).await.map_err(|e| DriverError::command(stage, e))?;
        field.send_keys(&enter_key()).await.map_err(|e| DriverError::command(stage, e))?;
        debug!("Title set: {}", title);
        Ok(())
    }

    async fn insert_block(&mut self, text: &str, as_heading: bool) -> Result<(), DriverError> {
        let stage = Stage::InsertBlock;
        self.state.ensure(SessionState::Editing, stage)?;
        let client = self.client(stage)?;

        let target = client.active_element().await.map_err(|e| DriverError::command(stage, e))?;
        let inserted = client
            .execute(INSERT_TEXT_JS, vec![json!(text)])
            .await
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(false);
        if !inserted {
            debug!("insertText unavailable, typing block instead");
            target.send_keys(text).await.map_err(|e| DriverError::command(stage, e))?;
        }

        for _ in 0..confirm_presses(as_heading) {
            target.send_keys(&enter_key()).await.map_err(|e| DriverError::command(stage, e))?;
        }
        Ok(())
    }

    async fn save(&mut self) -> Result<(), DriverError> {
        let stage = Stage::Save;
        self.state.ensure(SessionState::Editing, stage)?;

        let button = self.wait_for(stage, &self.platform.save_button, self.browser.element_timeout()).await?;
        button.click().await.map_err(|e| DriverError::command(stage, e))?;
        self.wait_for_quiescence(stage).await?;

        self.state.transition(SessionState::Saving, stage)?;
        info!("💾 Draft saved");
        Ok(())
    }

    async fn publish_if_available(&mut self) -> Result<PublishOutcome, DriverError> {
        let stage = Stage::Publish;
        self.state.ensure(SessionState::Saving, stage)?;

        let probe = self.browser.publish_probe();
        let button = match self.wait_for(stage, &self.platform.publish_button, probe).await {
            Ok(button) => button,
            Err(DriverError::Timeout { .. }) => {
                info!("No publish control after {:?}, leaving as draft", probe);
                self.state.transition(SessionState::Draft, stage)?;
                return Ok(PublishOutcome::Draft);
            }
            Err(e) => return Err(e),
        };
        if !button.is_displayed().await.map_err(|e| DriverError::command(stage, e))? {
            info!("Publish control is hidden, leaving as draft");
            self.state.transition(SessionState::Draft, stage)?;
            return Ok(PublishOutcome::Draft);
        }
        button.click().await.map_err(|e| DriverError::command(stage, e))?;

        let confirm = self
            .wait_for(stage, &self.platform.publish_confirm_button, self.browser.publish_timeout())
            .await?;
        confirm.click().await.map_err(|e| DriverError::command(stage, e))?;
        self.wait_for_quiescence(stage).await?;

        self.state.transition(SessionState::Published, stage)?;
        info!("📢 Article published");
        Ok(PublishOutcome::Published)
    }

    async fn teardown(&mut self) {
        if let Some(client) = self.client.take() {
            match timeout(self.browser.element_timeout(), client.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to close browser session: {}", e),
                Err(_) => warn!("Timed out closing browser session"),
            }
        }
        if let Some(mut server) = self.server.take() {
            if let Err(e) = server.kill().await {
                warn!("Failed to stop webdriver process: {}", e);
            }
        }
        self.state = SessionState::Closed;
        debug!("🧹 Browser session torn down");
    }
}

fn locator(selector: &Selector) -> Locator<'_> {
    match selector {
        Selector::Css(css) => Locator::Css(css),
        Selector::XPath(xpath) => Locator::XPath(xpath),
    }
}

fn enter_key() -> String {
    let key: char = Key::Enter.into();
    key.to_string()
}

fn webdriver_port(webdriver_url: &str) -> Option<u16> {
    Url::parse(webdriver_url).ok()?.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_json(
            r#"{"openai_api_key":"k","news_api_key":"n","note_email":"writer@example.com","note_password":"s3cret"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_webdriver_port() {
        assert_eq!(webdriver_port("http://localhost:4444"), Some(4444));
        assert_eq!(webdriver_port("http://localhost"), Some(80));
        assert_eq!(webdriver_port("not a url"), None);
    }

    #[test]
    fn test_headless_capabilities() {
        let session = WebDriverSession::new(&test_config());
        let caps = session.capabilities();
        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome_args.iter().any(|a| a == "--headless=new"));
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "-headless");
    }

    #[test]
    fn test_headed_capabilities() {
        let mut config = test_config();
        config.browser.headless = false;
        let caps = WebDriverSession::new(&config).capabilities();
        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!chrome_args.iter().any(|a| a == "--headless=new"));
        assert!(caps["moz:firefoxOptions"]["args"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let session = WebDriverSession::new(&test_config());
        let debug = format!("{:?}", session);
        assert!(debug.contains("writer@example.com"));
        assert!(!debug.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_editing_before_launch_is_rejected() {
        let mut session = WebDriverSession::new(&test_config());
        let err = session.set_title("Title").await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidState { stage: Stage::SetTitle, state: SessionState::Closed }
        ));
        assert!(session.save().await.is_err());
    }

    #[tokio::test]
    async fn test_teardown_without_session() {
        let mut session = WebDriverSession::new(&test_config());
        session.teardown().await;
        assert_eq!(session.state(), SessionState::Closed);
    }
}
