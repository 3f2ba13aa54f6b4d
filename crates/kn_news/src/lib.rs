pub mod collector;
pub mod newsapi;

pub use collector::NewsCollector;
pub use newsapi::NewsApiSource;

pub mod prelude {
    pub use super::{NewsApiSource, NewsCollector};
    pub use kn_core::{Category, NewsItem, NewsSource, Result, Error};
}
