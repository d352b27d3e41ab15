use crate::types::{DigestArchive, DigestRun, FeedSource, HistoryStore, Result, SourceRegistry};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::{debug, info};

/// Postgres-backed source registry, send history and digest archive.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Insert sources, leaving URLs that are already registered untouched.
    /// Returns how many rows were added.
    pub async fn seed_sources(&self, sources: &[FeedSource]) -> Result<u64> {
        let mut added = 0;
        for source in sources {
            let result = sqlx::query(
                r#"
                INSERT INTO sources (name, category, url, active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (url) DO NOTHING
                "#,
            )
            .bind(&source.name)
            .bind(&source.category)
            .bind(&source.url)
            .bind(source.active)
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 0 {
                debug!("Source already registered: {}", source.url);
            }
            added += result.rows_affected();
        }

        info!("Seeded {} of {} sources", added, sources.len());
        Ok(added)
    }

    async fn load_active_sources(&self) -> Result<Vec<FeedSource>> {
        let rows = sqlx::query(
            "SELECT name, category, url, active FROM sources WHERE active = true ORDER BY category, name",
        )
        .fetch_all(&self.db)
        .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for row in rows {
            sources.push(FeedSource {
                name: row.try_get("name")?,
                category: row.try_get("category")?,
                url: row.try_get("url")?,
                active: row.try_get("active")?,
            });
        }
        Ok(sources)
    }

    async fn load_recent_links(&self, days: u32) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT a.article_url
            FROM digest_articles a
            JOIN digests d ON d.id = a.digest_id
            WHERE d.created_at > NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days as i32)
        .fetch_all(&self.db)
        .await?;

        let mut links = HashSet::with_capacity(rows.len());
        for row in rows {
            links.insert(row.try_get::<String, _>("article_url")?);
        }
        Ok(links)
    }

    async fn insert_run(&self, run: &DigestRun) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO digests (id, subject, created_at, items_analyzed, unique_sources, counters)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run.id)
        .bind(&run.subject)
        .bind(run.created_at)
        .bind(run.counters.items_new as i32)
        .bind(run.counters.unique_sources as i32)
        .bind(serde_json::to_string(&run.counters)?)
        .execute(&mut *tx)
        .await?;

        for item in &run.items {
            sqlx::query(
                r#"
                INSERT INTO digest_articles
                    (digest_id, article_url, title, source, category, tags, summary,
                     relevance_score, published_at, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(run.id)
            .bind(item.link())
            .bind(item.title())
            .bind(&item.item().source)
            .bind(item.category())
            .bind(serde_json::to_string(item.tags())?)
            .bind(&item.summary)
            .bind(item.score())
            .bind(item.item().published)
            .bind(item.position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Recorded digest {} with {} articles", run.id, run.items.len());
        Ok(())
    }
}

#[async_trait]
impl SourceRegistry for PgStore {
    async fn active_sources(&self) -> anyhow::Result<Vec<FeedSource>> {
        Ok(self.load_active_sources().await?)
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn recent_links(&self, days: u32) -> anyhow::Result<HashSet<String>> {
        Ok(self.load_recent_links(days).await?)
    }
}

#[async_trait]
impl DigestArchive for PgStore {
    async fn record(&self, run: &DigestRun) -> anyhow::Result<()> {
        Ok(self.insert_run(run).await?)
    }
}
