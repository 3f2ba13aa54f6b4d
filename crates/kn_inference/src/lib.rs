pub mod editorial;
pub mod models;

pub mod prelude {
    pub use super::editorial::{CritiqueDecision, EditorialDraft, Editor};
    pub use super::models::{create_model, DummyModel, OpenAiModel};
    pub use kn_core::{LanguageModel, Result, Error};
}

pub use editorial::{Conversation, CritiqueDecision, EditorialDraft, Editor};
pub use models::{create_model, DummyModel, OpenAiModel};
