use tracing::info;

use nd_core::{Article, ArticleStore, Error, Result};

use crate::retry::{retry, RetryPolicy};

/// How a save ended. `Duplicate` means the source URL was already stored
/// by the time the write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Duplicate,
}

/// Validate and persist one article. Transient storage failures are
/// retried under `policy`; a duplicate returns immediately without
/// retrying; anything else fails this article only.
pub async fn save(
    store: &dyn ArticleStore,
    article: &Article,
    policy: RetryPolicy,
) -> Result<SaveOutcome> {
    validate(article)?;

    match retry(policy, Error::is_transient, || store.insert_article(article)).await {
        Ok(()) => {
            info!("💾 Saved {} ({})", article.dna_code, article.title);
            Ok(SaveOutcome::Saved)
        }
        Err(Error::Duplicate(_)) => Ok(SaveOutcome::Duplicate),
        Err(e) => Err(e),
    }
}

fn validate(article: &Article) -> Result<()> {
    if article.title.trim().is_empty() {
        return Err(Error::Validation("Article title is empty".to_string()));
    }
    if article.content.trim().is_empty() {
        return Err(Error::Validation("Article content is empty".to_string()));
    }
    if article
        .summary
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        return Err(Error::Validation("Article summary is empty".to_string()));
    }
    if article.sequence == 0 {
        return Err(Error::Validation(
            "Article sequence was never allocated".to_string(),
        ));
    }
    Ok(())
}
