use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the source registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub category: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// URLs of the active sources, in registry order.
pub fn source_urls(sources: &[FeedSource]) -> Vec<String> {
    sources
        .iter()
        .filter(|source| source.active)
        .map(|source| source.url.clone())
        .collect()
}

/// Distinct categories across the active sources.
pub fn source_categories(sources: &[FeedSource]) -> BTreeSet<String> {
    sources
        .iter()
        .filter(|source| source.active)
        .map(|source| source.category.clone())
        .collect()
}

/// A raw feed entry after fetch, before any scoring.
///
/// `link` is the canonical link and the identity of the item within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    /// Relevance in [0.0, 10.0]; 0 when scoring failed.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub scored: ScoredItem,
    pub category: String,
    pub tags: Vec<String>,
}

impl AnnotatedItem {
    pub fn title(&self) -> &str {
        &self.scored.item.title
    }

    pub fn link(&self) -> &str {
        &self.scored.item.link
    }

    pub fn score(&self) -> f64 {
        self.scored.score
    }
}

/// Terminal state of an item: chosen for the digest and summarised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    #[serde(flatten)]
    pub annotated: AnnotatedItem,
    pub summary: String,
    /// 1-based position in the digest.
    pub position: usize,
}

impl SelectedItem {
    pub fn item(&self) -> &CandidateItem {
        &self.annotated.scored.item
    }

    pub fn title(&self) -> &str {
        self.annotated.title()
    }

    pub fn link(&self) -> &str {
        self.annotated.link()
    }

    pub fn score(&self) -> f64 {
        self.annotated.score()
    }

    pub fn category(&self) -> &str {
        &self.annotated.category
    }

    pub fn tags(&self) -> &[String] {
        &self.annotated.tags
    }
}

/// Aggregate counters of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub sources_requested: usize,
    pub sources_failed: usize,
    /// Items parsed across all sources, duplicates included.
    pub items_fetched: usize,
    pub items_unique: usize,
    pub items_recent: usize,
    /// Items left after dropping links sent in earlier digests.
    pub items_new: usize,
    /// Distinct source names among the items that were analysed.
    pub unique_sources: usize,
    pub items_scored: usize,
    pub items_annotated: usize,
    pub items_selected: usize,
}

/// Everything the archive and the delivery side receive about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRun {
    pub id: Uuid,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub counters: RunCounters,
    pub items: Vec<SelectedItem>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// The oracle asked us to slow down (rate limited or overloaded).
    #[error("oracle overloaded: {0}")]
    Overloaded(String),

    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Overloaded(_))
    }
}

// Collaborator contracts.
//
// The pipeline only ever talks to the outside world through these traits.
// Implementations may be backed by a database, an HTTP API or plain memory
// (see `state`), and report their own failures through `anyhow`.

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn active_sources(&self) -> anyhow::Result<Vec<FeedSource>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Links included in digests created within the last `days` days.
    async fn recent_links(&self, days: u32) -> anyhow::Result<HashSet<String>>;
}

/// Text completion service used for scoring, tagging and summarising.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[async_trait]
pub trait DigestArchive: Send + Sync {
    async fn record(&self, run: &DigestRun) -> anyhow::Result<()>;
}

/// Rendering/delivery side: receives the finished digest.
#[async_trait]
pub trait DigestSink: Send + Sync {
    async fn deliver(&self, run: &DigestRun) -> anyhow::Result<()>;
}
