use std::time::Duration;

/// Tunables for scraping runs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Results requested per search query.
    pub max_results: u32,
    /// New (non-duplicate) articles accepted per grid combination.
    pub per_combo_cap: u32,
    /// Concurrent resolve/classify slots in discovery mode.
    pub fan_out: usize,
    /// Shortest article body worth keeping, in bytes.
    pub min_content_len: usize,
    pub save_attempts: u32,
    pub save_backoff: Duration,
    /// How far back thread candidates are considered, in days.
    pub recency_window_days: i64,
    /// Candidates offered to the similarity capability.
    pub thread_candidates: u32,
    /// Longest text prefix handed to classification, in chars.
    pub classify_prefix: usize,
    /// Longest text prefix handed to summarization, in chars.
    pub summary_prefix: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            per_combo_cap: 2,
            fan_out: 5,
            min_content_len: 300,
            save_attempts: 3,
            save_backoff: Duration::from_millis(500),
            recency_window_days: 30,
            thread_candidates: 5,
            classify_prefix: 2000,
            summary_prefix: 3000,
        }
    }
}
