use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// One result returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Discovery boundary: find candidate articles and pull their full text.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;

    /// Full text for a URL. `Ok(None)` means the provider had nothing
    /// usable for that page.
    async fn extract(&self, url: &str) -> Result<Option<String>>;
}
