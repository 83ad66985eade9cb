use async_trait::async_trait;

use crate::Result;

/// A candidate thread offered to the model during continuity decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadCandidate {
    pub id: String,
    pub title: String,
    pub dna_code: String,
}

/// The model's continuity verdict for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadPick {
    /// Join the thread with this id (or DNA code; callers resolve both).
    Existing(String),
    NewThread,
}

/// Language-model boundary used for classification, summarization and
/// thread continuity.
#[async_trait]
pub trait NewsModel: Send + Sync {
    fn name(&self) -> &str;

    /// Return a raw category reply for the article text. Callers normalize
    /// the reply against the closed category set.
    async fn classify(&self, title: &str, content: &str) -> Result<String>;

    async fn summarize(&self, title: &str, content: &str) -> Result<String>;

    /// Decide whether the article continues one of the candidate threads.
    async fn pick_thread(
        &self,
        title: &str,
        source_url: &str,
        candidates: &[ThreadCandidate],
    ) -> Result<ThreadPick>;
}
