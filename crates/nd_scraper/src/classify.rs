use tracing::warn;

use nd_core::{Category, NewsModel};

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Category for an article. A valid override wins outright; otherwise the
/// model's reply is normalized against the closed set, and any model
/// failure degrades to the default category instead of dropping the item.
pub async fn classify(
    model: &dyn NewsModel,
    title: &str,
    content: &str,
    override_category: Option<&str>,
    max_chars: usize,
) -> Category {
    if let Some(forced) = override_category {
        match forced.parse::<Category>() {
            Ok(category) => return category,
            Err(_) => warn!("⚠️ Ignoring invalid category override: {}", forced),
        }
    }

    match model.classify(title, prefix(content, max_chars)).await {
        Ok(raw) => Category::normalize(&raw),
        Err(e) => {
            warn!("⚠️ Classification failed, defaulting to ECO: {}", e);
            Category::Eco
        }
    }
}

/// Summary for an article; the title stands in when the model fails or
/// returns nothing. Never empty for a non-empty title.
pub async fn summarize(
    model: &dyn NewsModel,
    title: &str,
    content: &str,
    max_chars: usize,
) -> String {
    match model.summarize(title, prefix(content, max_chars)).await {
        Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
        Ok(_) => title.to_string(),
        Err(e) => {
            warn!("⚠️ Summarization failed, using title: {}", e);
            title.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nd_core::{Error, Result, ThreadCandidate, ThreadPick};

    struct CannedModel {
        classify_reply: Result<String>,
        summarize_reply: Result<String>,
    }

    impl CannedModel {
        fn classifying(reply: &str) -> Self {
            Self {
                classify_reply: Ok(reply.to_string()),
                summarize_reply: Ok("A summary.".to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                classify_reply: Err(Error::Inference("model down".to_string())),
                summarize_reply: Err(Error::Inference("model down".to_string())),
            }
        }
    }

    #[async_trait]
    impl NewsModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn classify(&self, _title: &str, _content: &str) -> Result<String> {
            match &self.classify_reply {
                Ok(reply) => Ok(reply.clone()),
                Err(_) => Err(Error::Inference("model down".to_string())),
            }
        }

        async fn summarize(&self, _title: &str, _content: &str) -> Result<String> {
            match &self.summarize_reply {
                Ok(reply) => Ok(reply.clone()),
                Err(_) => Err(Error::Inference("model down".to_string())),
            }
        }

        async fn pick_thread(
            &self,
            _title: &str,
            _source_url: &str,
            _candidates: &[ThreadCandidate],
        ) -> Result<ThreadPick> {
            Ok(ThreadPick::NewThread)
        }
    }

    #[test]
    fn test_prefix_respects_char_boundaries() {
        assert_eq!(prefix("hello", 10), "hello");
        assert_eq!(prefix("hello", 3), "hel");
        assert_eq!(prefix("héllo", 2), "hé");
        assert_eq!(prefix("🦀🦀🦀", 1), "🦀");
        assert_eq!(prefix("", 5), "");
    }

    #[tokio::test]
    async fn test_model_reply_is_normalized() {
        let model = CannedModel::classifying(" pol ");
        assert_eq!(classify(&model, "T", "C", None, 2000).await, Category::Pol);

        let model = CannedModel::classifying("SOMETHING_ELSE");
        assert_eq!(classify(&model, "T", "C", None, 2000).await, Category::Eco);
    }

    #[tokio::test]
    async fn test_valid_override_wins() {
        // the model would say POL; the override forces TEC without a call
        let model = CannedModel::classifying("POL");
        assert_eq!(
            classify(&model, "T", "C", Some("tec"), 2000).await,
            Category::Tec
        );
    }

    #[tokio::test]
    async fn test_invalid_override_falls_back_to_model() {
        let model = CannedModel::classifying("SPO");
        assert_eq!(
            classify(&model, "T", "C", Some("NOT_A_CODE"), 2000).await,
            Category::Spo
        );
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_default() {
        let model = CannedModel::failing();
        assert_eq!(classify(&model, "T", "C", None, 2000).await, Category::Eco);
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_title() {
        let model = CannedModel::failing();
        assert_eq!(summarize(&model, "The headline", "C", 3000).await, "The headline");

        let model = CannedModel {
            classify_reply: Ok("ECO".to_string()),
            summarize_reply: Ok("   ".to_string()),
        };
        assert_eq!(summarize(&model, "The headline", "C", 3000).await, "The headline");

        let model = CannedModel::classifying("ECO");
        assert_eq!(summarize(&model, "The headline", "C", 3000).await, "A summary.");
    }
}
