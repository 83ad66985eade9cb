use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, Category, Country, DnaCode, StoryThread};
use crate::Result;

/// Persistence boundary for articles and story threads. Backends must treat
/// `source_url` and `dna_code` as unique.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a fully-populated article. Returns `Error::Duplicate` when an
    /// article with the same source URL already exists.
    async fn insert_article(&self, article: &Article) -> Result<()>;

    async fn find_by_url(&self, source_url: &str) -> Result<Option<Article>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Article>>;

    async fn find_by_code(&self, code: &DnaCode) -> Result<Option<Article>>;

    /// Highest sequence already allocated for the partition, if any.
    async fn max_sequence(
        &self,
        country: Country,
        category: Category,
        year: i32,
    ) -> Result<Option<u32>>;

    /// Articles in a (country, category) published on or after `since`,
    /// newest first, capped at `limit`.
    async fn recent_articles(
        &self,
        country: Country,
        category: Category,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Article>>;

    /// Most recently scraped article in a thread, if the thread has any.
    async fn latest_in_thread(&self, thread_id: &str) -> Result<Option<Article>>;

    /// Most recently scraped articles across all partitions, newest first.
    async fn recent_history(&self, limit: u32) -> Result<Vec<Article>>;

    async fn count_articles(&self) -> Result<u64>;

    /// Articles scraped at or after the given instant.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Distinct threads that have at least one article.
    async fn count_threads(&self) -> Result<u64>;

    /// Article totals per country, highest first, ties by code.
    async fn country_counts(&self) -> Result<Vec<(Country, u64)>>;

    /// Article totals per category, highest first, ties by code.
    async fn category_counts(&self) -> Result<Vec<(Category, u64)>>;

    /// Create the thread if no thread with that id exists yet.
    async fn create_thread_if_absent(&self, thread: &StoryThread) -> Result<()>;

    async fn find_thread(&self, thread_id: &str) -> Result<Option<StoryThread>>;
}
