use std::collections::HashSet;

use async_trait::async_trait;

use nd_core::{Category, NewsModel, Result, ThreadCandidate, ThreadPick};

const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Pol,
        &["election", "parliament", "minister", "senate", "president"],
    ),
    (
        Category::Eco,
        &["market", "economy", "inflation", "trade", "bank"],
    ),
    (
        Category::Soc,
        &["school", "education", "culture", "community"],
    ),
    (
        Category::Tec,
        &["technology", "software", "startup", "ai", "chip"],
    ),
    (
        Category::Env,
        &["climate", "wildfire", "pollution", "energy"],
    ),
    (
        Category::Hea,
        &["hospital", "vaccine", "disease", "health"],
    ),
    (
        Category::Spo,
        &["match", "tournament", "cricket", "football", "olympic"],
    ),
    (
        Category::Sec,
        &["military", "border", "cyberattack", "police"],
    ),
];

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Deterministic offline model. No network, no API key; useful for local
/// runs and as a fallback when no Gemini key is configured.
pub struct KeywordModel;

impl KeywordModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsModel for KeywordModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, title: &str, content: &str) -> Result<String> {
        let words = tokens(&format!("{} {}", title, content));
        let mut best: Option<(usize, Category)> = None;
        for (category, keywords) in KEYWORDS {
            let hits = keywords.iter().filter(|k| words.contains(**k)).count();
            if hits > 0 && best.map_or(true, |(b, _)| hits > b) {
                best = Some((hits, *category));
            }
        }
        Ok(best
            .map(|(_, category)| category.as_str().to_string())
            .unwrap_or_else(|| "ECO".to_string()))
    }

    async fn summarize(&self, _title: &str, content: &str) -> Result<String> {
        let summary: String = content.split_inclusive('.').take(2).collect();
        let summary = summary.trim();
        // Callers fall back to the title when the summary comes back empty.
        Ok(summary.to_string())
    }

    async fn pick_thread(
        &self,
        title: &str,
        _source_url: &str,
        candidates: &[ThreadCandidate],
    ) -> Result<ThreadPick> {
        let title_words: HashSet<String> = tokens(title)
            .into_iter()
            .filter(|w| w.len() > 3)
            .collect();

        // Candidates arrive newest first; strict comparison keeps the
        // earliest best match, so ties go to the most recent article.
        let mut best: Option<(usize, &ThreadCandidate)> = None;
        for candidate in candidates {
            let shared = tokens(&candidate.title)
                .into_iter()
                .filter(|w| w.len() > 3 && title_words.contains(w))
                .count();
            if shared >= 2 && best.map_or(true, |(b, _)| shared > b) {
                best = Some((shared, candidate));
            }
        }

        Ok(match best {
            Some((_, candidate)) => ThreadPick::Existing(candidate.id.clone()),
            None => ThreadPick::NewThread,
        })
    }
}
