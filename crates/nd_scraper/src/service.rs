use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use nd_core::{
    Article, ArticleStore, Category, Country, Error, ItemOutcome, NewsModel, Result, RunLogEntry,
    ScrapeEvent, ScrapeStage, ScrapeStats, ScrapeStatus, SearchHit, SearchProvider,
    SessionSnapshot,
};

use crate::classify;
use crate::config::ScrapeConfig;
use crate::identifier;
use crate::resolver::{self, Resolution};
use crate::retry::RetryPolicy;
use crate::threading;
use crate::writer::{self, SaveOutcome};

const MAX_LOG_ENTRIES: usize = 200;
const EVENT_CAPACITY: usize = 256;

/// Parameters for a grid run over countries × topics.
#[derive(Debug, Clone, Deserialize)]
pub struct GridRequest {
    pub countries: Vec<Country>,
    pub topics: Vec<String>,
    /// Date folded into the search query; today when unset.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl GridRequest {
    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(Error::InvalidInput("No countries requested".to_string()));
        }
        if self.topics.is_empty() {
            return Err(Error::InvalidInput("No topics requested".to_string()));
        }
        if self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("Blank topic in request".to_string()));
        }
        Ok(())
    }
}

/// Compact listing for history queries.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub dna_code: String,
    pub title: String,
    pub country: Country,
    pub category: Category,
    pub scraped_at: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Store-wide aggregates plus the live run state.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOverview {
    pub total_articles: u64,
    /// Articles scraped in the last 24 hours.
    pub recent_articles: u64,
    pub active_threads: u64,
    pub country_counts: Vec<(Country, u64)>,
    pub category_counts: Vec<(Category, u64)>,
    pub is_running: bool,
    pub current_stats: ScrapeStats,
}

pub async fn history(store: &dyn ArticleStore, limit: u32) -> Result<Vec<HistoryEntry>> {
    let articles = store.recent_history(limit).await?;
    Ok(articles
        .into_iter()
        .map(|a| HistoryEntry {
            id: a.id,
            dna_code: a.dna_code.to_string(),
            title: a.title,
            country: a.country,
            category: a.category,
            scraped_at: a.scraped_at,
            summary: a.summary,
        })
        .collect())
}

pub async fn stats_overview(store: &dyn ArticleStore) -> Result<StatsOverview> {
    let since = Utc::now() - chrono::Duration::hours(24);
    Ok(StatsOverview {
        total_articles: store.count_articles().await?,
        recent_articles: store.count_since(since).await?,
        active_threads: store.count_threads().await?,
        country_counts: store.country_counts().await?,
        category_counts: store.category_counts().await?,
        is_running: false,
        current_stats: ScrapeStats::default(),
    })
}

/// A resolved and classified candidate, ready for the sequential tail of
/// the pipeline.
struct PreparedArticle {
    title: String,
    url: String,
    content: String,
    summary: String,
    country: Country,
    category: Category,
    published_at: DateTime<Utc>,
}

enum ThreadStrategy<'a> {
    Explicit { topic: &'a str },
    Heuristic,
}

/// The run state machine. Owns the single-run lock, the session snapshot
/// and the event channel; drives discovery and grid runs end to end.
#[derive(Clone)]
pub struct ScrapeService {
    store: Arc<dyn ArticleStore>,
    search: Arc<dyn SearchProvider>,
    model: Arc<dyn NewsModel>,
    config: ScrapeConfig,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    session: Arc<RwLock<SessionSnapshot>>,
    events: broadcast::Sender<ScrapeEvent>,
}

impl ScrapeService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        search: Arc<dyn SearchProvider>,
        model: Arc<dyn NewsModel>,
        config: ScrapeConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            search,
            model,
            config,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            session: Arc::new(RwLock::new(SessionSnapshot::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Owned copy of the current session; never a live reference.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.clone()
    }

    /// Cooperative cancellation: no new items are taken up, items already
    /// counted are drained as skipped, and the run ends as completed.
    pub fn stop(&self) {
        if self.is_running() {
            info!("🛑 Stop requested");
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        history(self.store.as_ref(), limit).await
    }

    pub async fn stats_overview(&self) -> Result<StatsOverview> {
        let mut overview = stats_overview(self.store.as_ref()).await?;
        overview.is_running = self.is_running();
        overview.current_stats = self.session.read().await.stats;
        Ok(overview)
    }

    /// One broad query over world news, heuristic threading.
    pub async fn run_discovery(&self) -> Result<ScrapeStats> {
        self.begin().await?;
        info!("🚀 Starting discovery run");
        let result = self.discovery_inner().await;
        self.conclude(result).await
    }

    /// One scoped query per (country, topic) combination, explicit-key
    /// threading, a small cap of new articles per combination.
    pub async fn run_grid(&self, request: GridRequest) -> Result<ScrapeStats> {
        request.validate()?;
        self.begin().await?;
        info!(
            "🚀 Starting grid run: {} countries × {} topics",
            request.countries.len(),
            request.topics.len()
        );
        let result = self.grid_inner(&request).await;
        self.conclude(result).await
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }
        self.cancel.store(false, Ordering::SeqCst);

        let mut session = self.session.write().await;
        *session = SessionSnapshot {
            status: ScrapeStatus::Running,
            started_at: Some(Utc::now()),
            ..SessionSnapshot::default()
        };
        Ok(())
    }

    async fn conclude(&self, result: Result<ScrapeStats>) -> Result<ScrapeStats> {
        match result {
            Ok(stats) => {
                self.emit_progress(
                    ScrapeStage::Completed,
                    Some(100),
                    format!("Run finished: {}", stats),
                )
                .await;
                self.finish(ScrapeStatus::Completed).await;
                info!("✅ Run finished: {}", stats);
                Ok(stats)
            }
            Err(e) => {
                self.emit_error(format!("Run failed: {}", e)).await;
                self.emit_progress(ScrapeStage::Failed, None, "Run failed")
                    .await;
                self.finish(ScrapeStatus::Error).await;
                Err(e)
            }
        }
    }

    async fn finish(&self, status: ScrapeStatus) {
        {
            let mut session = self.session.write().await;
            session.status = status;
            session.finished_at = Some(Utc::now());
            session.stage = Some(match status {
                ScrapeStatus::Error => ScrapeStage::Failed,
                _ => ScrapeStage::Completed,
            });
            session.current_query = None;
            session.current_title = None;
        }
        self.running.store(false, Ordering::SeqCst);
        self.cancel.store(false, Ordering::SeqCst);
    }

    async fn emit_progress(
        &self,
        stage: ScrapeStage,
        percent: Option<u8>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        let stats = {
            let mut session = self.session.write().await;
            session.stage = Some(stage);
            session.stats
        };
        let _ = self.events.send(ScrapeEvent::Progress {
            stage,
            percent: percent.unwrap_or_else(|| stats.percent()),
            message,
            stats,
        });
    }

    async fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("❌ {}", message);
        let stats = self.session.read().await.stats;
        let _ = self.events.send(ScrapeEvent::Error { message, stats });
    }

    /// Count one terminal item outcome into the stats and the run log, and
    /// notify observers.
    async fn record_outcome(
        &self,
        stage: ScrapeStage,
        title: &str,
        url: &str,
        outcome: ItemOutcome,
    ) {
        let (stats, message) = {
            let mut session = self.session.write().await;
            session.stats.record(&outcome);
            let message = match &outcome {
                ItemOutcome::Saved { dna_code } => format!("Saved {}: {}", dna_code, title),
                ItemOutcome::Skipped { reason } => format!("Skipped ({}): {}", reason, title),
                ItemOutcome::Errored { message } => format!("Error on {}: {}", title, message),
            };
            session.log.push(RunLogEntry {
                title: title.to_string(),
                url: url.to_string(),
                outcome,
                at: Utc::now(),
            });
            if session.log.len() > MAX_LOG_ENTRIES {
                let excess = session.log.len() - MAX_LOG_ENTRIES;
                session.log.drain(..excess);
            }
            (session.stats, message)
        };
        let _ = self.events.send(ScrapeEvent::Progress {
            stage,
            percent: stats.percent(),
            message,
            stats,
        });
    }

    async fn discovery_inner(&self) -> Result<ScrapeStats> {
        let query = format!("world news {}", Utc::now().date_naive());
        {
            let mut session = self.session.write().await;
            session.current_query = Some(query.clone());
        }
        self.emit_progress(ScrapeStage::Searching, Some(0), format!("Searching: {}", query))
            .await;

        let hits = self.search.search(&query, self.config.max_results).await?;
        info!("🔎 Discovery search returned {} results", hits.len());

        let prepared = self.resolve_batch(hits, None).await;
        for item in prepared {
            if self.cancelled() {
                self.record_outcome(
                    ScrapeStage::Saving,
                    &item.title,
                    &item.url,
                    ItemOutcome::Skipped {
                        reason: "run stopped".to_string(),
                    },
                )
                .await;
                continue;
            }
            self.finish_item(item, ThreadStrategy::Heuristic).await;
        }

        Ok(self.session.read().await.stats)
    }

    async fn grid_inner(&self, request: &GridRequest) -> Result<ScrapeStats> {
        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

        'combos: for &country in &request.countries {
            for topic in &request.topics {
                if self.cancelled() {
                    info!("🛑 Run stopped before {} / {}", country, topic);
                    break 'combos;
                }
                self.scrape_combination(country, topic, date).await;
            }
        }

        Ok(self.session.read().await.stats)
    }

    /// One grid cell: scoped search, then a sequential accept loop capped
    /// at `per_combo_cap` newly saved articles. Results beyond the cap are
    /// left untouched and never counted.
    async fn scrape_combination(&self, country: Country, topic: &str, date: NaiveDate) {
        let query = format!("{} {} news {}", country.display_name(), topic, date);
        {
            let mut session = self.session.write().await;
            session.current_query = Some(query.clone());
        }
        self.emit_progress(ScrapeStage::Searching, None, format!("Searching: {}", query))
            .await;

        let hits = match self.search.search(&query, self.config.max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("⚠️ Search failed for {} / {}: {}", country, topic, e);
                self.emit_error(format!("Search failed for {} {}: {}", country, topic, e))
                    .await;
                return;
            }
        };
        info!("🔎 {} results for {} / {}", hits.len(), country, topic);

        let mut accepted = 0u32;
        for hit in hits {
            if self.cancelled() {
                break;
            }
            if accepted >= self.config.per_combo_cap {
                info!(
                    "✋ Cap reached for {} / {}, leaving remaining results untouched",
                    country, topic
                );
                break;
            }
            let Some(item) = self.prepare(hit, Some(country)).await else {
                continue;
            };
            if self.cancelled() {
                self.record_outcome(
                    ScrapeStage::Saving,
                    &item.title,
                    &item.url,
                    ItemOutcome::Skipped {
                        reason: "run stopped".to_string(),
                    },
                )
                .await;
                break;
            }
            if let Some(SaveOutcome::Saved) = self
                .finish_item(item, ThreadStrategy::Explicit { topic })
                .await
            {
                accepted += 1;
            }
        }
    }

    /// Concurrent head of the discovery pipeline: resolve and classify up
    /// to `fan_out` candidates at a time. Items that end here (duplicate,
    /// too short, provider error) are recorded as they fall out.
    async fn resolve_batch(
        &self,
        hits: Vec<SearchHit>,
        forced_country: Option<Country>,
    ) -> Vec<PreparedArticle> {
        let results: Vec<Option<PreparedArticle>> = stream::iter(hits)
            .take_while(|_| future::ready(!self.cancelled()))
            .map(|hit| self.prepare(hit, forced_country))
            .buffer_unordered(self.config.fan_out)
            .collect()
            .await;
        results.into_iter().flatten().collect()
    }

    /// Take up one candidate: count it as found, gate it through the
    /// resolver, classify and summarize. `None` means the item already
    /// reached a terminal outcome and was recorded.
    async fn prepare(
        &self,
        hit: SearchHit,
        forced_country: Option<Country>,
    ) -> Option<PreparedArticle> {
        {
            let mut session = self.session.write().await;
            session.stats.found += 1;
            session.current_title = Some(hit.title.clone());
        }
        self.emit_progress(ScrapeStage::Resolving, None, format!("Resolving: {}", hit.title))
            .await;

        let resolution = match resolver::resolve(
            self.store.as_ref(),
            self.search.as_ref(),
            &hit.url,
            self.config.min_content_len,
        )
        .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                self.record_outcome(
                    ScrapeStage::Resolving,
                    &hit.title,
                    &hit.url,
                    ItemOutcome::Errored {
                        message: e.to_string(),
                    },
                )
                .await;
                return None;
            }
        };

        let content = match resolution {
            Resolution::Text(text) => text,
            Resolution::Duplicate => {
                self.record_outcome(
                    ScrapeStage::Resolving,
                    &hit.title,
                    &hit.url,
                    ItemOutcome::Skipped {
                        reason: "duplicate".to_string(),
                    },
                )
                .await;
                return None;
            }
            Resolution::TooShort(len) => {
                self.record_outcome(
                    ScrapeStage::Resolving,
                    &hit.title,
                    &hit.url,
                    ItemOutcome::Skipped {
                        reason: format!("content too short ({} chars)", len),
                    },
                )
                .await;
                return None;
            }
        };

        self.emit_progress(
            ScrapeStage::Classifying,
            None,
            format!("Classifying: {}", hit.title),
        )
        .await;
        let category = classify::classify(
            self.model.as_ref(),
            &hit.title,
            &content,
            None,
            self.config.classify_prefix,
        )
        .await;
        let summary = classify::summarize(
            self.model.as_ref(),
            &hit.title,
            &content,
            self.config.summary_prefix,
        )
        .await;

        let country = forced_country
            .or_else(|| Country::from_domain(&hit.url))
            .unwrap_or(Country::Usa);

        Some(PreparedArticle {
            title: hit.title,
            url: hit.url,
            content,
            summary,
            country,
            category,
            published_at: hit.published_at.unwrap_or_else(Utc::now),
        })
    }

    /// Sequential tail of the pipeline, identifier allocation through the
    /// persisted write. Kept serial so sequence numbers for a partition
    /// never collide.
    async fn finish_item(
        &self,
        item: PreparedArticle,
        strategy: ThreadStrategy<'_>,
    ) -> Option<SaveOutcome> {
        let year = Utc::now().year();
        let code = match identifier::next_code(
            self.store.as_ref(),
            item.country,
            item.category,
            year,
        )
        .await
        {
            Ok(code) => code,
            Err(e) => {
                self.record_outcome(
                    ScrapeStage::Saving,
                    &item.title,
                    &item.url,
                    ItemOutcome::Errored {
                        message: e.to_string(),
                    },
                )
                .await;
                return None;
            }
        };

        self.emit_progress(ScrapeStage::Threading, None, format!("Threading: {}", item.title))
            .await;
        let link = match &strategy {
            ThreadStrategy::Explicit { topic } => {
                threading::resolve_explicit(
                    self.store.as_ref(),
                    item.country,
                    item.category,
                    topic,
                )
                .await
            }
            ThreadStrategy::Heuristic => {
                threading::resolve_heuristic(
                    self.store.as_ref(),
                    self.model.as_ref(),
                    &item.title,
                    &item.url,
                    item.country,
                    item.category,
                    self.config.recency_window_days,
                    self.config.thread_candidates,
                )
                .await
            }
        };
        let link = match link {
            Ok(link) => link,
            Err(e) => {
                self.record_outcome(
                    ScrapeStage::Threading,
                    &item.title,
                    &item.url,
                    ItemOutcome::Errored {
                        message: e.to_string(),
                    },
                )
                .await;
                return None;
            }
        };

        self.emit_progress(
            ScrapeStage::Saving,
            None,
            format!("Saving {}: {}", code, item.title),
        )
        .await;

        let article = Article {
            id: Uuid::new_v4().to_string(),
            dna_code: code,
            title: item.title,
            content: item.content,
            summary: Some(item.summary),
            source_url: item.url,
            published_at: item.published_at,
            scraped_at: Utc::now(),
            country: item.country,
            category: item.category,
            year,
            sequence: code.sequence,
            thread_id: link.thread_id,
            parent_id: link.parent_id,
        };

        let policy = RetryPolicy::new(self.config.save_attempts, self.config.save_backoff);
        match writer::save(self.store.as_ref(), &article, policy).await {
            Ok(SaveOutcome::Saved) => {
                {
                    let mut session = self.session.write().await;
                    session.countries.insert(article.country);
                    session.categories.insert(article.category);
                }
                self.record_outcome(
                    ScrapeStage::Saving,
                    &article.title,
                    &article.source_url,
                    ItemOutcome::Saved {
                        dna_code: article.dna_code.to_string(),
                    },
                )
                .await;
                Some(SaveOutcome::Saved)
            }
            Ok(SaveOutcome::Duplicate) => {
                self.record_outcome(
                    ScrapeStage::Saving,
                    &article.title,
                    &article.source_url,
                    ItemOutcome::Skipped {
                        reason: "duplicate".to_string(),
                    },
                )
                .await;
                Some(SaveOutcome::Duplicate)
            }
            Err(e) => {
                self.record_outcome(
                    ScrapeStage::Saving,
                    &article.title,
                    &article.source_url,
                    ItemOutcome::Errored {
                        message: e.to_string(),
                    },
                )
                .await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_request_validation() {
        let ok = GridRequest {
            countries: vec![Country::India],
            topics: vec!["policy".to_string()],
            date: None,
        };
        assert!(ok.validate().is_ok());

        let no_countries = GridRequest {
            countries: vec![],
            topics: vec!["policy".to_string()],
            date: None,
        };
        assert!(matches!(
            no_countries.validate(),
            Err(Error::InvalidInput(_))
        ));

        let no_topics = GridRequest {
            countries: vec![Country::India],
            topics: vec![],
            date: None,
        };
        assert!(matches!(no_topics.validate(), Err(Error::InvalidInput(_))));

        let blank_topic = GridRequest {
            countries: vec![Country::India],
            topics: vec!["  ".to_string()],
            date: None,
        };
        assert!(matches!(
            blank_topic.validate(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_grid_request_deserializes() {
        let json = r#"{"countries": ["INDIA", "UK"], "topics": ["policy"], "date": "2025-06-01"}"#;
        let request: GridRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.countries, vec![Country::India, Country::Uk]);
        assert_eq!(request.date, Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));

        let json = r#"{"countries": ["USA"], "topics": ["trade"]}"#;
        let request: GridRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.date, None);
    }
}
