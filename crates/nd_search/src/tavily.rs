use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nd_core::{Error, Result, SearchHit, SearchProvider};

const BASE_URL: &str = "https://api.tavily.com";

/// Search and extraction over the Tavily HTTP API.
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Search("Tavily API key is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, api_key })
    }
}

impl fmt::Debug for TavilyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TavilyProvider")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    topic: &'static str,
    search_depth: &'static str,
    days: u32,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    published_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    urls: Vec<&'a str>,
    extract_depth: &'static str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractResult>,
}

#[derive(Debug, Deserialize)]
struct ExtractResult {
    #[allow(dead_code)]
    url: String,
    raw_content: Option<String>,
}

/// Tavily reports publication dates in RFC 2822 for news results and
/// RFC 3339 elsewhere. Anything else is dropped.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let request = SearchRequest {
            query,
            topic: "news",
            search_depth: "advanced",
            days: 1,
            max_results,
        };
        debug!("🔎 Tavily search: {}", query);

        let response = self
            .client
            .post(format!("{}/search", BASE_URL))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Tavily search returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let hits = parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                published_at: r.published_date.as_deref().and_then(parse_published),
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect();
        Ok(hits)
    }

    async fn extract(&self, url: &str) -> Result<Option<String>> {
        let request = ExtractRequest {
            urls: vec![url],
            extract_depth: "basic",
            format: "text",
        };

        let response = self
            .client
            .post(format!("{}/extract", BASE_URL))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "Tavily extract returned {}: {}",
                status, body
            )));
        }

        let parsed: ExtractResponse = response.json().await?;
        let text = parsed
            .results
            .into_iter()
            .next()
            .and_then(|r| r.raw_content)
            .filter(|t| !t.trim().is_empty());
        if text.is_none() {
            warn!("⚠️ Tavily returned no usable text for {}", url);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_decodes() {
        let json = r#"{
            "query": "India economy news 2025-06-01",
            "results": [
                {
                    "url": "https://example.in/markets",
                    "title": "Markets rally",
                    "content": "Stocks climbed on Monday...",
                    "published_date": "Mon, 02 Jun 2025 08:30:00 GMT",
                    "score": 0.97
                },
                {
                    "url": "https://example.in/bare"
                }
            ],
            "response_time": 1.2
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Markets rally");
        assert_eq!(parsed.results[1].title, "");
        assert!(parsed.results[1].published_date.is_none());
    }

    #[test]
    fn test_extract_response_decodes() {
        let json = r#"{
            "results": [
                {"url": "https://example.com/a", "raw_content": "Full article body."}
            ],
            "failed_results": []
        }"#;
        let parsed: ExtractResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.results[0].raw_content.as_deref(),
            Some("Full article body.")
        );
    }

    #[test]
    fn test_parse_published_accepts_both_formats() {
        let rfc2822 = parse_published("Mon, 02 Jun 2025 08:30:00 GMT").unwrap();
        assert_eq!(rfc2822.to_rfc3339(), "2025-06-02T08:30:00+00:00");

        let rfc3339 = parse_published("2025-06-02T08:30:00Z").unwrap();
        assert_eq!(rfc3339, rfc2822);

        assert!(parse_published("yesterday-ish").is_none());
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(TavilyProvider::new("").is_err());
        assert!(TavilyProvider::new("   ").is_err());
        assert!(TavilyProvider::new("tvly-test").is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = TavilyProvider::new("tvly-secret").unwrap();
        let rendered = format!("{:?}", provider);
        assert!(!rendered.contains("tvly-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
