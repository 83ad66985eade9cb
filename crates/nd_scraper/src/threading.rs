use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use nd_core::{
    Article, ArticleStore, Category, Country, DnaCode, NewsModel, Result, StoryThread,
    ThreadCandidate, ThreadPick,
};

/// Thread linkage for an article about to be persisted. `thread_id` is
/// always set; articles are never left unthreaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLink {
    pub thread_id: String,
    pub parent_id: Option<String>,
}

/// Lowercased, hyphen-joined alphanumeric words.
pub fn topic_slug(topic: &str) -> String {
    topic
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Deterministic thread id for grid runs: same (country, topic) always
/// lands in the same thread.
pub fn explicit_key(country: Country, topic: &str) -> String {
    format!("{}-{}", country.as_str(), topic_slug(topic))
}

/// Explicit-key mode. The key names the thread outright; the parent is the
/// most recently scraped article already in it, chaining articles in scrape
/// order.
pub async fn resolve_explicit(
    store: &dyn ArticleStore,
    country: Country,
    category: Category,
    topic: &str,
) -> Result<ThreadLink> {
    let thread_id = explicit_key(country, topic);
    let thread = StoryThread {
        id: thread_id.clone(),
        title: format!("{} {}", country.display_name(), topic),
        description: Some(format!(
            "Ongoing coverage of {} in {}",
            topic,
            country.display_name()
        )),
        country,
        category,
        started_at: Utc::now(),
        article_count: 0,
    };
    store.create_thread_if_absent(&thread).await?;

    let parent_id = store.latest_in_thread(&thread_id).await?.map(|a| a.id);
    Ok(ThreadLink {
        thread_id,
        parent_id,
    })
}

/// Heuristic mode. Recent same-country/category articles are offered to the
/// similarity capability; its pick is resolved back to a stored article
/// whose thread the new article inherits. Anything unresolvable starts a
/// fresh thread.
pub async fn resolve_heuristic(
    store: &dyn ArticleStore,
    model: &dyn NewsModel,
    title: &str,
    source_url: &str,
    country: Country,
    category: Category,
    window_days: i64,
    max_candidates: u32,
) -> Result<ThreadLink> {
    let since = Utc::now() - Duration::days(window_days);
    let recent = store
        .recent_articles(country, category, since, max_candidates)
        .await?;
    let candidates: Vec<ThreadCandidate> = recent
        .iter()
        .map(|a| ThreadCandidate {
            id: a.id.clone(),
            title: a.title.clone(),
            dna_code: a.dna_code.to_string(),
        })
        .collect();

    let pick = model.pick_thread(title, source_url, &candidates).await?;

    let link = match pick {
        ThreadPick::Existing(token) => lookup_pick(store, &candidates, &token).await?,
        ThreadPick::NewThread => None,
    };

    match link {
        Some(link) => Ok(link),
        None => create_thread(store, title, country, category).await,
    }
}

/// Resolve a similarity reply to a stored article: candidate id or DNA
/// first, then direct store lookups.
async fn lookup_pick(
    store: &dyn ArticleStore,
    candidates: &[ThreadCandidate],
    token: &str,
) -> Result<Option<ThreadLink>> {
    let candidate_id = candidates
        .iter()
        .find(|c| c.id.eq_ignore_ascii_case(token) || c.dna_code.eq_ignore_ascii_case(token))
        .map(|c| c.id.clone());
    if let Some(id) = candidate_id {
        if let Some(article) = store.find_by_id(&id).await? {
            return Ok(Some(link_to(article)));
        }
    }

    if let Some(article) = store.find_by_id(token).await? {
        return Ok(Some(link_to(article)));
    }
    if let Ok(code) = token.parse::<DnaCode>() {
        if let Some(article) = store.find_by_code(&code).await? {
            return Ok(Some(link_to(article)));
        }
    }

    warn!("⚠️ Similarity pick '{}' matched no stored article", token);
    Ok(None)
}

fn link_to(article: Article) -> ThreadLink {
    ThreadLink {
        thread_id: article.thread_id.clone(),
        parent_id: Some(article.id),
    }
}

async fn create_thread(
    store: &dyn ArticleStore,
    title: &str,
    country: Country,
    category: Category,
) -> Result<ThreadLink> {
    let id = Uuid::new_v4().to_string();
    let thread = StoryThread {
        id: id.clone(),
        title: title.chars().take(100).collect(),
        description: None,
        country,
        category,
        started_at: Utc::now(),
        article_count: 0,
    };
    store.create_thread_if_absent(&thread).await?;
    info!("✨ New thread: {}", thread.title);

    Ok(ThreadLink {
        thread_id: id,
        parent_id: None,
    })
}
