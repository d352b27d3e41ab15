use crate::types::{DigestRun, DigestSink};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Hands the digest to an external renderer/mailer as pretty JSON, either in
/// a file or on stdout.
pub struct JsonSink {
    path: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn render(run: &DigestRun) -> serde_json::Result<String> {
        serde_json::to_string_pretty(run)
    }
}

#[async_trait]
impl DigestSink for JsonSink {
    async fn deliver(&self, run: &DigestRun) -> anyhow::Result<()> {
        let json = Self::render(run).context("Failed to serialize digest")?;

        match &self.path {
            Some(path) => {
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write digest to {}", path.display()))?;
                info!("Wrote digest '{}' to {}", run.subject, path.display());
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

/// Dry-run sink: logs what would have been sent.
pub struct PreviewSink;

#[async_trait]
impl DigestSink for PreviewSink {
    async fn deliver(&self, run: &DigestRun) -> anyhow::Result<()> {
        let c = &run.counters;
        info!("DRY RUN - digest not sent");
        info!("Subject: {}", run.subject);
        info!(
            "Sources: {} requested, {} failed; items: {} fetched, {} unique, {} recent, {} new from {} sources",
            c.sources_requested,
            c.sources_failed,
            c.items_fetched,
            c.items_unique,
            c.items_recent,
            c.items_new,
            c.unique_sources
        );

        for item in &run.items {
            info!(
                "{}. [{:.1}] {} ({}, {}) {}",
                item.position,
                item.score(),
                item.title(),
                item.item().source,
                item.category(),
                item.link()
            );
            info!("   {}", item.summary);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunCounters;
    use chrono::Utc;
    use uuid::Uuid;

    fn empty_run() -> DigestRun {
        DigestRun {
            id: Uuid::new_v4(),
            subject: "The Paper - March 7, 2025".to_string(),
            created_at: Utc::now(),
            counters: RunCounters::default(),
            items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn json_sink_writes_file() {
        let path = std::env::temp_dir().join(format!("digest-{}.json", Uuid::new_v4()));
        let run = empty_run();

        JsonSink::new(Some(path.clone())).deliver(&run).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: DigestRun = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, run);
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
