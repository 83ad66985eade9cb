use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nd_core::{Error, NewsModel, Result, ThreadCandidate, ThreadPick};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-3-flash-preview";

/// Gemini-backed classification, summarization and thread continuity.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Inference("Gemini API key is missing".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, api_key })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", BASE_URL, MODEL))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let reply = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();
        if reply.is_empty() {
            return Err(Error::Inference("Gemini returned an empty reply".to_string()));
        }
        Ok(reply)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ReplyCandidate>,
}

#[derive(Debug, Deserialize)]
struct ReplyCandidate {
    content: ReplyContent,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

/// Models wrap the bare token in quotes or backticks often enough that we
/// strip them before matching.
fn parse_pick(reply: &str) -> ThreadPick {
    let cleaned = reply
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("NEW_THREAD") {
        ThreadPick::NewThread
    } else {
        ThreadPick::Existing(cleaned.to_string())
    }
}

#[async_trait]
impl NewsModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn classify(&self, title: &str, content: &str) -> Result<String> {
        let prompt = format!(
            "You are a news categorization expert. Classify articles into exactly one of these categories: \
             POL (Politics), ECO (Economy), SOC (Society), TEC (Technology), ENV (Environment), \
             HEA (Health), SPO (Sports), SEC (Security). Return ONLY the 3-letter code.\n\n\
             Title: {}\n\nContent: {}",
            title, content
        );
        self.generate(&prompt).await
    }

    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let prompt = format!(
            "You are a news summarization expert. Create a concise 2-3 sentence summary of the article. \
             Be factual and objective.\n\nTitle: {}\n\nContent: {}",
            title, content
        );
        self.generate(&prompt).await
    }

    async fn pick_thread(
        &self,
        title: &str,
        source_url: &str,
        candidates: &[ThreadCandidate],
    ) -> Result<ThreadPick> {
        if candidates.is_empty() {
            debug!("🧠 No thread candidates, starting a new thread");
            return Ok(ThreadPick::NewThread);
        }

        let lines: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} | {} | {}", c.id, c.title, c.dna_code))
            .collect();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        let prompt = format!(
            "Decide if the NEW article should be threaded with one of the EXISTING articles. \
             Choose the SINGLE most relevant existing article if related. \
             Return EXACTLY the chosen article's ID string. \
             If none are related, return 'NEW_THREAD'. \
             Return only a bare ID or NEW_THREAD with no extra text.\n\n\
             New Article:\nTitle: {}\nURL: {}\n\n\
             Existing Articles (ID | Title | DNA):\n{}\n\n\
             Return ONLY one of: {}, or NEW_THREAD.",
            title,
            source_url,
            lines.join("\n"),
            ids.join(", ")
        );

        let reply = self.generate(&prompt).await?;
        debug!("🧠 Threading decision: {}", reply);
        Ok(parse_pick(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_response_decodes() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [{"text": "POL"}],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ],
            "modelVersion": "gemini-3-flash-preview"
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "POL");
    }

    #[test]
    fn test_generate_response_tolerates_empty_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_parse_pick() {
        assert_eq!(parse_pick("NEW_THREAD"), ThreadPick::NewThread);
        assert_eq!(parse_pick("new_thread"), ThreadPick::NewThread);
        assert_eq!(parse_pick(" 'NEW_THREAD' "), ThreadPick::NewThread);
        assert_eq!(parse_pick("``"), ThreadPick::NewThread);
        assert_eq!(
            parse_pick("abc-123"),
            ThreadPick::Existing("abc-123".to_string())
        );
        assert_eq!(
            parse_pick("`USA-ECO-2025-001`"),
            ThreadPick::Existing("USA-ECO-2025-001".to_string())
        );
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        assert!(GeminiModel::new(None).is_err());
        assert!(GeminiModel::new(Some("  ".into())).is_err());
        assert!(GeminiModel::new(Some("key".into())).is_ok());
    }

    #[tokio::test]
    async fn test_empty_candidates_short_circuit() {
        let model = GeminiModel::new(Some("key".into())).unwrap();
        let pick = model
            .pick_thread("Some headline", "https://example.com", &[])
            .await
            .unwrap();
        assert_eq!(pick, ThreadPick::NewThread);
    }
}
