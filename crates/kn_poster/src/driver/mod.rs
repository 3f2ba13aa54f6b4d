use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod webdriver;

pub use webdriver::WebDriverSession;

/// Lifecycle of one browser session.
///
/// `Closed -> Launching -> Authenticating -> Ready -> Editing -> Saving -> {Published | Draft}`,
/// and any state may go back to `Closed` on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Launching,
    Authenticating,
    Ready,
    Editing,
    Saving,
    Published,
    Draft,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (_, Closed)
                | (Closed, Launching)
                | (Launching, Authenticating)
                | (Authenticating, Ready)
                | (Ready, Editing)
                | (Editing, Saving)
                | (Saving, Published)
                | (Saving, Draft)
        )
    }

    /// Moves to `next`, or reports which stage tried an out-of-order step.
    pub fn transition(&mut self, next: SessionState, stage: Stage) -> Result<(), DriverError> {
        if !self.can_transition_to(next) {
            return Err(DriverError::InvalidState { stage, state: *self });
        }
        *self = next;
        Ok(())
    }

    pub fn ensure(self, expected: SessionState, stage: Stage) -> Result<(), DriverError> {
        if self == expected {
            Ok(())
        } else {
            Err(DriverError::InvalidState { stage, state: self })
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::Launching => "launching",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Editing => "editing",
            SessionState::Saving => "saving",
            SessionState::Published => "published",
            SessionState::Draft => "draft",
        };
        f.write_str(name)
    }
}

/// The posting step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Launch,
    Authenticate,
    OpenEditor,
    SetTitle,
    InsertBlock,
    Save,
    Publish,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Launch => "launch",
            Stage::Authenticate => "authenticate",
            Stage::OpenEditor => "open_editor",
            Stage::SetTitle => "set_title",
            Stage::InsertBlock => "insert_block",
            Stage::Save => "save",
            Stage::Publish => "publish",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("[{stage}] timed out after {timeout:?} waiting for {what}")]
    Timeout {
        stage: Stage,
        what: String,
        timeout: Duration,
    },

    #[error("[{stage}] not allowed while the session is {state}")]
    InvalidState { stage: Stage, state: SessionState },

    #[error("[{stage}] could not start browser session: {message}")]
    Launch { stage: Stage, message: String },

    #[error("[{stage}] browser command failed: {message}")]
    Command { stage: Stage, message: String },
}

impl DriverError {
    pub fn stage(&self) -> Stage {
        match self {
            DriverError::Timeout { stage, .. }
            | DriverError::InvalidState { stage, .. }
            | DriverError::Launch { stage, .. }
            | DriverError::Command { stage, .. } => *stage,
        }
    }

    pub fn command(stage: Stage, err: impl fmt::Display) -> Self {
        DriverError::Command { stage, message: err.to_string() }
    }

    pub fn timeout(stage: Stage, what: impl Into<String>, timeout: Duration) -> Self {
        DriverError::Timeout { stage, what: what.into(), timeout }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Saved, but no publish control showed up.
    Draft,
}

/// Primitive UI operations against the publishing platform.
///
/// One value drives one session. Editing primitives are only valid between
/// `open_editor` and `save`; `teardown` is valid in every state and must
/// always leave the driver `Closed`.
#[async_trait]
pub trait PublishingDriver: Send {
    fn state(&self) -> SessionState;

    /// Open a fresh, isolated browser session
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Log in; the session is `Ready` on success
    async fn authenticate(&mut self) -> Result<(), DriverError>;

    /// Navigate to a new, empty document
    async fn open_editor(&mut self) -> Result<(), DriverError>;

    async fn set_title(&mut self, title: &str) -> Result<(), DriverError>;

    /// Insert `text` as one block, then confirm once for headings or twice for paragraphs
    async fn insert_block(&mut self, text: &str, as_heading: bool) -> Result<(), DriverError>;

    async fn save(&mut self) -> Result<(), DriverError>;

    /// Publish if the platform offers it; `Draft` when it does not
    async fn publish_if_available(&mut self) -> Result<PublishOutcome, DriverError>;

    /// Release the browser session and any process behind it
    async fn teardown(&mut self);
}

/// Builds a fresh driver for every posting run.
pub type DriverFactory = Box<dyn Fn() -> Box<dyn PublishingDriver> + Send + Sync>;

/// Number of confirm keypresses after a block.
pub fn confirm_presses(as_heading: bool) -> usize {
    if as_heading {
        1
    } else {
        2
    }
}
