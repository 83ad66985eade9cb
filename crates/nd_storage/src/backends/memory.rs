use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use nd_core::{Article, ArticleStore, Category, Country, DnaCode, Error, Result, StoryThread};

#[derive(Default)]
struct Inner {
    articles: Vec<Article>,
    threads: HashMap<String, StoryThread>,
}

/// Non-persistent backend for tests and local experiments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_counts<K: Copy>(map: HashMap<K, u64>, code: fn(&K) -> &'static str) -> Vec<(K, u64)> {
    let mut counts: Vec<(K, u64)> = map.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| code(&a.0).cmp(code(&b.0))));
    counts
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_article(&self, article: &Article) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .articles
            .iter()
            .any(|a| a.source_url == article.source_url)
        {
            return Err(Error::Duplicate(format!(
                "Article already exists for {}",
                article.source_url
            )));
        }
        if inner.articles.iter().any(|a| a.dna_code == article.dna_code) {
            return Err(Error::Storage(format!(
                "DNA code already allocated: {}",
                article.dna_code
            )));
        }
        if let Some(thread) = inner.threads.get_mut(&article.thread_id) {
            thread.article_count += 1;
        }
        inner.articles.push(article.clone());
        Ok(())
    }

    async fn find_by_url(&self, source_url: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .find(|a| a.source_url == source_url)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_code(&self, code: &DnaCode) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.dna_code == *code).cloned())
    }

    async fn max_sequence(
        &self,
        country: Country,
        category: Category,
        year: i32,
    ) -> Result<Option<u32>> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.country == country && a.category == category && a.year == year)
            .map(|a| a.sequence)
            .max())
    }

    async fn recent_articles(
        &self,
        country: Country,
        category: Category,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| a.country == country && a.category == category && a.published_at >= since)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn latest_in_thread(&self, thread_id: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.thread_id == thread_id)
            .max_by_key(|a| a.scraped_at)
            .cloned())
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut articles = inner.articles.clone();
        articles.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        articles.truncate(limit as usize);
        Ok(articles)
    }

    async fn count_articles(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.articles.len() as u64)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.scraped_at >= since)
            .count() as u64)
    }

    async fn count_threads(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        let distinct: std::collections::HashSet<&str> = inner
            .articles
            .iter()
            .map(|a| a.thread_id.as_str())
            .collect();
        Ok(distinct.len() as u64)
    }

    async fn country_counts(&self) -> Result<Vec<(Country, u64)>> {
        let inner = self.inner.read().await;
        let mut map: HashMap<Country, u64> = HashMap::new();
        for article in &inner.articles {
            *map.entry(article.country).or_insert(0) += 1;
        }
        Ok(sorted_counts(map, Country::as_str))
    }

    async fn category_counts(&self) -> Result<Vec<(Category, u64)>> {
        let inner = self.inner.read().await;
        let mut map: HashMap<Category, u64> = HashMap::new();
        for article in &inner.articles {
            *map.entry(article.category).or_insert(0) += 1;
        }
        Ok(sorted_counts(map, Category::as_str))
    }

    async fn create_thread_if_absent(&self, thread: &StoryThread) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .threads
            .entry(thread.id.clone())
            .or_insert_with(|| thread.clone());
        Ok(())
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<StoryThread>> {
        let inner = self.inner.read().await;
        Ok(inner.threads.get(thread_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    fn article(seq: u32, url: &str) -> Article {
        let now = Utc::now();
        Article {
            id: format!("id-{}", seq),
            dna_code: DnaCode::new(Country::Usa, Category::Eco, now.year(), seq),
            title: format!("Article {}", seq),
            content: "Body text.".to_string(),
            summary: Some("Summary.".to_string()),
            source_url: url.to_string(),
            published_at: now,
            scraped_at: now,
            country: Country::Usa,
            category: Category::Eco,
            year: now.year(),
            sequence: seq,
            thread_id: "thread-1".to_string(),
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        store
            .insert_article(&article(1, "https://example.com/a"))
            .await
            .unwrap();

        assert!(store
            .find_by_url("https://example.com/a")
            .await
            .unwrap()
            .is_some());
        assert!(store.find_by_url("https://example.com/b").await.unwrap().is_none());
        assert_eq!(
            store
                .max_sequence(Country::Usa, Category::Eco, Utc::now().year())
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            store
                .max_sequence(Country::Uk, Category::Eco, Utc::now().year())
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let store = MemoryStore::new();
        store
            .insert_article(&article(1, "https://example.com/a"))
            .await
            .unwrap();
        let err = store
            .insert_article(&article(2, "https://example.com/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_dna_collision_is_storage_error() {
        let store = MemoryStore::new();
        store
            .insert_article(&article(1, "https://example.com/a"))
            .await
            .unwrap();
        let err = store
            .insert_article(&article(1, "https://example.com/b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_thread_count_bumped_on_insert() {
        let store = MemoryStore::new();
        let thread = StoryThread {
            id: "thread-1".to_string(),
            title: "A story".to_string(),
            description: None,
            country: Country::Usa,
            category: Category::Eco,
            started_at: Utc::now(),
            article_count: 0,
        };
        store.create_thread_if_absent(&thread).await.unwrap();
        store
            .insert_article(&article(1, "https://example.com/a"))
            .await
            .unwrap();
        store
            .insert_article(&article(2, "https://example.com/b"))
            .await
            .unwrap();

        let stored = store.find_thread("thread-1").await.unwrap().unwrap();
        assert_eq!(stored.article_count, 2);
        assert_eq!(store.count_threads().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_articles_window_and_order() {
        let store = MemoryStore::new();
        let mut old = article(1, "https://example.com/old");
        old.published_at = Utc::now() - Duration::days(45);
        let recent = article(2, "https://example.com/recent");
        store.insert_article(&old).await.unwrap();
        store.insert_article(&recent).await.unwrap();

        let since = Utc::now() - Duration::days(30);
        let found = store
            .recent_articles(Country::Usa, Category::Eco, since, 5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sequence, 2);
    }

    #[tokio::test]
    async fn test_counts_sorted_by_total() {
        let store = MemoryStore::new();
        let mut a = article(1, "https://example.com/a");
        a.country = Country::India;
        a.dna_code = DnaCode::new(Country::India, Category::Eco, a.year, 1);
        let mut b = article(2, "https://example.com/b");
        b.country = Country::India;
        b.dna_code = DnaCode::new(Country::India, Category::Eco, b.year, 2);
        let c = article(3, "https://example.com/c");
        store.insert_article(&a).await.unwrap();
        store.insert_article(&b).await.unwrap();
        store.insert_article(&c).await.unwrap();

        let counts = store.country_counts().await.unwrap();
        assert_eq!(counts[0], (Country::India, 2));
        assert_eq!(counts[1], (Country::Usa, 1));
    }
}
