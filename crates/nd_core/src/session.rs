use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::{Category, Country};

/// Lifecycle of a scraping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Idle => "idle",
            ScrapeStatus::Running => "running",
            ScrapeStatus::Completed => "completed",
            ScrapeStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeStatus::Completed | ScrapeStatus::Error)
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the pipeline a run currently is. Progress events carry this so
/// observers can render a phase label without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStage {
    Starting,
    Searching,
    Resolving,
    Classifying,
    Threading,
    Saving,
    Completed,
    Failed,
}

impl ScrapeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStage::Starting => "starting",
            ScrapeStage::Searching => "searching",
            ScrapeStage::Resolving => "resolving",
            ScrapeStage::Classifying => "classifying",
            ScrapeStage::Threading => "threading",
            ScrapeStage::Saving => "saving",
            ScrapeStage::Completed => "completed",
            ScrapeStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeStage::Completed | ScrapeStage::Failed)
    }
}

impl fmt::Display for ScrapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one candidate item ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Saved { dna_code: String },
    Skipped { reason: String },
    Errored { message: String },
}

/// Per-run counters. Every item counted in `found` ends up in exactly one
/// of the other three buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub found: u64,
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl ScrapeStats {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Saved { .. } => self.processed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Errored { .. } => self.errors += 1,
        }
    }

    pub fn attempted(&self) -> u64 {
        self.processed + self.skipped + self.errors
    }

    /// Completion percentage over found items, clamped to 100.
    pub fn percent(&self) -> u8 {
        if self.found == 0 {
            return 0;
        }
        let pct = self.attempted() * 100 / self.found;
        pct.min(100) as u8
    }
}

impl fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {}, processed {}, skipped {}, errors {}",
            self.found, self.processed, self.skipped, self.errors
        )
    }
}

/// One line of the per-run activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub title: String,
    pub url: String,
    pub outcome: ItemOutcome,
    pub at: DateTime<Utc>,
}

/// Snapshot of the current (or most recent) session, readable at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: ScrapeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: ScrapeStats,
    pub countries: BTreeSet<Country>,
    pub categories: BTreeSet<Category>,
    pub stage: Option<ScrapeStage>,
    pub current_query: Option<String>,
    pub current_title: Option<String>,
    pub log: Vec<RunLogEntry>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: ScrapeStatus::Idle,
            started_at: None,
            finished_at: None,
            stats: ScrapeStats::default(),
            countries: BTreeSet::new(),
            categories: BTreeSet::new(),
            stage: None,
            current_query: None,
            current_title: None,
            log: Vec::new(),
        }
    }
}

/// Broadcast to live observers while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScrapeEvent {
    Progress {
        stage: ScrapeStage,
        percent: u8,
        message: String,
        stats: ScrapeStats,
    },
    Error {
        message: String,
        stats: ScrapeStats,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_buckets() {
        let mut stats = ScrapeStats::default();
        stats.found = 3;
        stats.record(&ItemOutcome::Saved {
            dna_code: "USA-ECO-2025-001".into(),
        });
        stats.record(&ItemOutcome::Skipped {
            reason: "duplicate".into(),
        });
        stats.record(&ItemOutcome::Errored {
            message: "boom".into(),
        });
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.attempted(), stats.found);
    }

    #[test]
    fn test_stats_percent() {
        let mut stats = ScrapeStats::default();
        assert_eq!(stats.percent(), 0);
        stats.found = 4;
        stats.processed = 1;
        assert_eq!(stats.percent(), 25);
        stats.processed = 4;
        assert_eq!(stats.percent(), 100);
        // attempted can momentarily exceed found mid-update; clamp
        stats.errors = 1;
        assert_eq!(stats.percent(), 100);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ScrapeStatus::Running.is_terminal());
        assert!(ScrapeStatus::Completed.is_terminal());
        assert!(ScrapeStatus::Error.is_terminal());
        assert!(!ScrapeStage::Saving.is_terminal());
        assert!(ScrapeStage::Completed.is_terminal());
        assert!(ScrapeStage::Failed.is_terminal());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ScrapeEvent::Progress {
            stage: ScrapeStage::Searching,
            percent: 0,
            message: "starting".into(),
            stats: ScrapeStats::default(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"stage\":\"searching\""));
    }
}
