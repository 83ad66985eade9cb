pub mod error;
pub mod model;
pub mod search;
pub mod session;
pub mod store;
pub mod types;

pub use error::Error;
pub use model::{NewsModel, ThreadCandidate, ThreadPick};
pub use search::{SearchHit, SearchProvider};
pub use session::{
    ItemOutcome, RunLogEntry, ScrapeEvent, ScrapeStage, ScrapeStats, ScrapeStatus, SessionSnapshot,
};
pub use store::ArticleStore;
pub use types::{Article, Category, Country, DnaCode, StoryThread};

pub type Result<T> = std::result::Result<T, Error>;
