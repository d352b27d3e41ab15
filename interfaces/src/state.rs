use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::defs::{DigestArchive, DigestRun, FeedSource, HistoryStore, SourceRegistry};

/// Registry over a fixed list of sources.
pub struct StaticRegistry {
    sources: Vec<FeedSource>,
}

impl StaticRegistry {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SourceRegistry for StaticRegistry {
    async fn active_sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self.sources.iter().filter(|source| source.active).cloned().collect())
    }
}

/// Send history kept as `(link, sent_at)` pairs.
#[derive(Default)]
pub struct MemoryHistory {
    sent: RwLock<Vec<(String, DateTime<Utc>)>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History where every link was sent right now.
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            sent: RwLock::new(links.into_iter().map(|link| (link.into(), now)).collect()),
        }
    }

    pub async fn record_sent(&self, link: impl Into<String>, sent_at: DateTime<Utc>) {
        self.sent.write().await.push((link.into(), sent_at));
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn recent_links(&self, days: u32) -> Result<HashSet<String>> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let sent = self.sent.read().await;
        Ok(sent
            .iter()
            .filter(|(_, sent_at)| *sent_at > cutoff)
            .map(|(link, _)| link.clone())
            .collect())
    }
}

/// Archive that keeps recorded runs in memory and answers history lookups
/// from them, the same way a database-backed archive would.
#[derive(Default)]
pub struct MemoryArchive {
    runs: RwLock<Vec<DigestRun>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<DigestRun> {
        self.runs.read().await.clone()
    }
}

#[async_trait]
impl DigestArchive for MemoryArchive {
    async fn record(&self, run: &DigestRun) -> Result<()> {
        self.runs.write().await.push(run.clone());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryArchive {
    async fn recent_links(&self, days: u32) -> Result<HashSet<String>> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .filter(|run| run.created_at > cutoff)
            .flat_map(|run| run.items.iter().map(|item| item.link().to_string()))
            .collect())
    }
}
