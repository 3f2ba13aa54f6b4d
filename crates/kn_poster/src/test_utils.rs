use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::driver::{
    DriverError, DriverFactory, PublishOutcome, PublishingDriver, SessionState, Stage,
};

/// One primitive call seen by a `RecordingDriver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Launch,
    Authenticate,
    OpenEditor,
    SetTitle(String),
    InsertBlock { text: String, as_heading: bool },
    Save,
    Publish,
    Teardown,
}

/// A driver double that records every call and never touches a browser.
///
/// Clones share the same call log, so a test can keep one handle while the
/// orchestrator consumes another through `factory()`.
#[derive(Debug, Clone)]
pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    state: SessionState,
    fail_at: Option<Stage>,
    panic_at: Option<Stage>,
    publish_available: bool,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    /// Create a driver that succeeds everywhere and can publish
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            state: SessionState::Closed,
            fail_at: None,
            panic_at: None,
            publish_available: true,
        }
    }

    /// Fail with a timeout when `stage` is reached
    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Panic when `stage` is reached
    pub fn panicking_at(mut self, stage: Stage) -> Self {
        self.panic_at = Some(stage);
        self
    }

    /// Never show a publish control
    pub fn without_publish(mut self) -> Self {
        self.publish_available = false;
        self
    }

    /// Everything recorded so far, in call order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn teardown_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == DriverCall::Teardown).count()
    }

    /// Texts of inserted blocks, in insertion order
    pub fn inserted_blocks(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::InsertBlock { text, as_heading } => Some((text, as_heading)),
                _ => None,
            })
            .collect()
    }

    /// A factory handing out fresh copies that share this driver's log
    pub fn factory(&self) -> DriverFactory {
        let template = self.clone();
        Box::new(move || -> Box<dyn PublishingDriver> {
            let mut driver = template.clone();
            driver.state = SessionState::Closed;
            Box::new(driver)
        })
    }

    fn record(&self, call: DriverCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, stage: Stage) -> Result<(), DriverError> {
        if self.panic_at == Some(stage) {
            panic!("RecordingDriver told to panic at {}", stage);
        }
        if self.fail_at == Some(stage) {
            return Err(DriverError::timeout(stage, "a scripted failure", Duration::from_millis(1)));
        }
        Ok(())
    }
}

#[async_trait]
impl PublishingDriver for RecordingDriver {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn launch(&mut self) -> Result<(), DriverError> {
        self.record(DriverCall::Launch);
        self.state.transition(SessionState::Launching, Stage::Launch)?;
        self.check(Stage::Launch)
    }

    async fn authenticate(&mut self) -> Result<(), DriverError> {
        self.record(DriverCall::Authenticate);
        self.state.transition(SessionState::Authenticating, Stage::Authenticate)?;
        self.check(Stage::Authenticate)?;
        self.state.transition(SessionState::Ready, Stage::Authenticate)
    }

    async fn open_editor(&mut self) -> Result<(), DriverError> {
        self.record(DriverCall::OpenEditor);
        self.state.transition(SessionState::Editing, Stage::OpenEditor)?;
        self.check(Stage::OpenEditor)
    }

    async fn set_title(&mut self, title: &str) -> Result<(), DriverError> {
        self.record(DriverCall::SetTitle(title.to_string()));
        self.state.ensure(SessionState::Editing, Stage::SetTitle)?;
        self.check(Stage::SetTitle)
    }

    async fn insert_block(&mut self, text: &str, as_heading: bool) -> Result<(), DriverError> {
        self.record(DriverCall::InsertBlock { text: text.to_string(), as_heading });
        self.state.ensure(SessionState::Editing, Stage::InsertBlock)?;
        self.check(Stage::InsertBlock)
    }

    async fn save(&mut self) -> Result<(), DriverError> {
        self.record(DriverCall::Save);
        self.state.ensure(SessionState::Editing, Stage::Save)?;
        self.check(Stage::Save)?;
        self.state.transition(SessionState::Saving, Stage::Save)
    }

    async fn publish_if_available(&mut self) -> Result<PublishOutcome, DriverError> {
        self.record(DriverCall::Publish);
        self.state.ensure(SessionState::Saving, Stage::Publish)?;
        self.check(Stage::Publish)?;
        if self.publish_available {
            self.state.transition(SessionState::Published, Stage::Publish)?;
            Ok(PublishOutcome::Published)
        } else {
            self.state.transition(SessionState::Draft, Stage::Publish)?;
            Ok(PublishOutcome::Draft)
        }
    }

    async fn teardown(&mut self) {
        self.record(DriverCall::Teardown);
        self.state = SessionState::Closed;
    }
}
