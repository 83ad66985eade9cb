pub mod classify;
pub mod config;
pub mod identifier;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod threading;
pub mod writer;

pub use config::ScrapeConfig;
pub use service::{GridRequest, HistoryEntry, ScrapeService, StatsOverview};
