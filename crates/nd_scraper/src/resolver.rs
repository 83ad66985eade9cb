use nd_core::{ArticleStore, Result, SearchProvider};

/// Outcome of the duplicate/length gate for one discovered URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Text(String),
    Duplicate,
    TooShort(usize),
}

/// Two-phase gate: URLs already stored are rejected before any network
/// call, then the extracted body must clear a minimum length. Both
/// rejections count as skips; provider failures propagate to the caller.
pub async fn resolve(
    store: &dyn ArticleStore,
    search: &dyn SearchProvider,
    url: &str,
    min_content_len: usize,
) -> Result<Resolution> {
    if store.find_by_url(url).await?.is_some() {
        return Ok(Resolution::Duplicate);
    }

    let text = search.extract(url).await?.unwrap_or_default();
    let text = text.trim();
    if text.len() < min_content_len {
        return Ok(Resolution::TooShort(text.len()));
    }
    Ok(Resolution::Text(text.to_string()))
}
