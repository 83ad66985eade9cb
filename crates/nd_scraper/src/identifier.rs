use nd_core::{ArticleStore, Category, Country, DnaCode, Result};

/// Next sequence for the (country, category, year) partition: highest
/// existing value plus one, or 1 for a fresh partition. Callers must keep
/// allocation and save sequential per partition; gaps are tolerated,
/// collisions are not.
pub async fn allocate(
    store: &dyn ArticleStore,
    country: Country,
    category: Category,
    year: i32,
) -> Result<u32> {
    let max = store.max_sequence(country, category, year).await?;
    Ok(max.map_or(1, |m| m + 1))
}

pub async fn next_code(
    store: &dyn ArticleStore,
    country: Country,
    category: Category,
    year: i32,
) -> Result<DnaCode> {
    let sequence = allocate(store, country, category, year).await?;
    Ok(DnaCode::new(country, category, year, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use nd_core::Article;
    use nd_storage::MemoryStore;

    fn article(seq: u32) -> Article {
        let now = Utc::now();
        Article {
            id: format!("id-{}", seq),
            dna_code: DnaCode::new(Country::Usa, Category::Eco, now.year(), seq),
            title: format!("Article {}", seq),
            content: "Body.".to_string(),
            summary: Some("Summary.".to_string()),
            source_url: format!("https://example.com/{}", seq),
            published_at: now,
            scraped_at: now,
            country: Country::Usa,
            category: Category::Eco,
            year: now.year(),
            sequence: seq,
            thread_id: "thread".to_string(),
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_partition_starts_at_one() {
        let store = MemoryStore::new();
        let year = Utc::now().year();
        assert_eq!(
            allocate(&store, Country::Usa, Category::Eco, year)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_allocation_continues_from_max() {
        let store = MemoryStore::new();
        let year = Utc::now().year();
        store.insert_article(&article(1)).await.unwrap();
        store.insert_article(&article(2)).await.unwrap();

        assert_eq!(
            allocate(&store, Country::Usa, Category::Eco, year)
                .await
                .unwrap(),
            3
        );
        // other partitions are untouched
        assert_eq!(
            allocate(&store, Country::Usa, Category::Pol, year)
                .await
                .unwrap(),
            1
        );

        let code = next_code(&store, Country::Usa, Category::Eco, year)
            .await
            .unwrap();
        assert_eq!(code.sequence, 3);
        assert_eq!(code.to_string(), format!("USA-ECO-{}-003", year));
    }
}
