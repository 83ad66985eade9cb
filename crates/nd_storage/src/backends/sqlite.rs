use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::info;

use nd_core::{Article, ArticleStore, Category, Country, DnaCode, Error, Result, StoryThread};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        dna_code TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        summary TEXT,
        source_url TEXT NOT NULL UNIQUE,
        published_at TEXT NOT NULL,
        scraped_at TEXT NOT NULL,
        country TEXT NOT NULL,
        category TEXT NOT NULL,
        year INTEGER NOT NULL,
        sequence INTEGER NOT NULL,
        thread_id TEXT NOT NULL,
        parent_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS threads (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        country TEXT NOT NULL,
        category TEXT NOT NULL,
        started_at TEXT NOT NULL,
        article_count INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_articles_partition
    ON articles (country, category, year)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_articles_thread
    ON articles (thread_id)
    "#,
    // Add future migrations here
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Connection(format!("Failed to open {}: {}", db_path.display(), e))
        })?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        info!("💾 SQLite store ready at {}", db_path.display());
        Ok(Self { pool })
    }
}

/// Duplicate source URLs are the one expected constraint hit; any other
/// unique violation is a data-integrity problem.
fn map_db_err(context: &str, e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            if db.message().contains("source_url") {
                Error::Duplicate(format!("{}: {}", context, db.message()))
            } else {
                Error::Storage(format!("{}: {}", context, db.message()))
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::Connection(format!("{}: {}", context, e))
        }
        _ => Error::Storage(format!("{}: {}", context, e)),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Bad timestamp {}: {}", raw, e)))
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let dna_code: String = row.get("dna_code");
    let country: String = row.get("country");
    let category: String = row.get("category");
    Ok(Article {
        id: row.get("id"),
        dna_code: dna_code.parse()?,
        title: row.get("title"),
        content: row.get("content"),
        summary: row.get("summary"),
        source_url: row.get("source_url"),
        published_at: parse_timestamp(row.get::<String, _>("published_at").as_str())?,
        scraped_at: parse_timestamp(row.get::<String, _>("scraped_at").as_str())?,
        country: country.parse()?,
        category: category.parse()?,
        year: row.get("year"),
        sequence: row.get("sequence"),
        thread_id: row.get("thread_id"),
        parent_id: row.get("parent_id"),
    })
}

fn thread_from_row(row: &SqliteRow) -> Result<StoryThread> {
    let country: String = row.get("country");
    let category: String = row.get("category");
    Ok(StoryThread {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        country: country.parse()?,
        category: category.parse()?,
        started_at: parse_timestamp(row.get::<String, _>("started_at").as_str())?,
        article_count: row.get("article_count"),
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn insert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
            (id, dna_code, title, content, summary, source_url, published_at, scraped_at,
             country, category, year, sequence, thread_id, parent_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(article.dna_code.to_string())
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.summary.as_deref())
        .bind(&article.source_url)
        .bind(article.published_at.to_rfc3339())
        .bind(article.scraped_at.to_rfc3339())
        .bind(article.country.as_str())
        .bind(article.category.as_str())
        .bind(article.year)
        .bind(article.sequence)
        .bind(&article.thread_id)
        .bind(article.parent_id.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to insert article", e))?;

        sqlx::query("UPDATE threads SET article_count = article_count + 1 WHERE id = ?")
            .bind(&article.thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to bump thread count", e))?;

        Ok(())
    }

    async fn find_by_url(&self, source_url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE source_url = ?")
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to look up article by url", e))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to look up article by id", e))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn find_by_code(&self, code: &DnaCode) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE dna_code = ?")
            .bind(code.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to look up article by code", e))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn max_sequence(
        &self,
        country: Country,
        category: Category,
        year: i32,
    ) -> Result<Option<u32>> {
        let row = sqlx::query(
            "SELECT MAX(sequence) AS max_seq FROM articles WHERE country = ? AND category = ? AND year = ?",
        )
        .bind(country.as_str())
        .bind(category.as_str())
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to read max sequence", e))?;
        let max: Option<i64> = row.get("max_seq");
        Ok(max.map(|v| v as u32))
    }

    async fn recent_articles(
        &self,
        country: Country,
        category: Category,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE country = ? AND category = ? AND published_at >= ?
            ORDER BY published_at DESC
            LIMIT ?
            "#,
        )
        .bind(country.as_str())
        .bind(category.as_str())
        .bind(since.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to fetch recent articles", e))?;
        rows.iter().map(article_from_row).collect()
    }

    async fn latest_in_thread(&self, thread_id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(
            "SELECT * FROM articles WHERE thread_id = ? ORDER BY scraped_at DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to fetch latest in thread", e))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY scraped_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to fetch history", e))?;
        rows.iter().map(article_from_row).collect()
    }

    async fn count_articles(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to count articles", e))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM articles WHERE scraped_at >= ?")
            .bind(since.to_rfc3339())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to count recent articles", e))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn count_threads(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(DISTINCT thread_id) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to count threads", e))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn country_counts(&self) -> Result<Vec<(Country, u64)>> {
        let rows = sqlx::query(
            r#"
            SELECT country, COUNT(*) AS total FROM articles
            GROUP BY country
            ORDER BY total DESC, country ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to count by country", e))?;
        rows.iter()
            .map(|row| {
                let country: String = row.get("country");
                let total: i64 = row.get("total");
                Ok((country.parse()?, total as u64))
            })
            .collect()
    }

    async fn category_counts(&self) -> Result<Vec<(Category, u64)>> {
        let rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) AS total FROM articles
            GROUP BY category
            ORDER BY total DESC, category ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to count by category", e))?;
        rows.iter()
            .map(|row| {
                let category: String = row.get("category");
                let total: i64 = row.get("total");
                Ok((category.parse()?, total as u64))
            })
            .collect()
    }

    async fn create_thread_if_absent(&self, thread: &StoryThread) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO threads
            (id, title, description, country, category, started_at, article_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&thread.id)
        .bind(&thread.title)
        .bind(thread.description.as_deref())
        .bind(thread.country.as_str())
        .bind(thread.category.as_str())
        .bind(thread.started_at.to_rfc3339())
        .bind(thread.article_count)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("Failed to create thread", e))?;
        Ok(())
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<StoryThread>> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err("Failed to look up thread", e))?;
        row.as_ref().map(thread_from_row).transpose()
    }
}
