pub mod driver;
pub mod markdown;
pub mod poster;
pub mod test_utils;

pub use driver::{DriverError, DriverFactory, PublishOutcome, PublishingDriver, SessionState, Stage};
pub use markdown::{parse, BlockKind, ContentBlock, ParsedArticle, UNTITLED_TITLE};
pub use poster::NotePoster;
