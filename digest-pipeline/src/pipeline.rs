use crate::fetcher::Fetcher;
use crate::filters::{exclude_sent, filter_recent};
use crate::llm_adapter::ItemOracle;
use crate::scoring::score_items;
use crate::selection::DiversitySelector;
use crate::summarizer::summarize_selected;
use crate::tagging::{annotate_top, candidate_count};
use crate::types::{HistoryStore, PipelineConfig, Result, RunCounters, SelectedItem};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// What one run produced. An empty `items` list is a normal outcome and
/// means there is nothing to send.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub items: Vec<SelectedItem>,
    pub counters: RunCounters,
}

impl PipelineOutcome {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs fetch, filters, scoring, tagging, selection and summaries in order.
pub struct DigestPipeline<O> {
    config: PipelineConfig,
    fetcher: Fetcher,
    history: Arc<dyn HistoryStore>,
    oracle: O,
}

impl<O: ItemOracle> DigestPipeline<O> {
    pub fn new(config: PipelineConfig, fetcher: Fetcher, history: Arc<dyn HistoryStore>, oracle: O) -> Self {
        Self {
            config,
            fetcher,
            history,
            oracle,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn run(&self, source_urls: &[String]) -> Result<PipelineOutcome> {
        self.run_at(source_urls, Utc::now()).await
    }

    /// Run against a fixed "now", which anchors the recency window.
    ///
    /// The only fatal error is every source failing; every other stage
    /// degrades per item and keeps going.
    pub async fn run_at(&self, source_urls: &[String], now: DateTime<Utc>) -> Result<PipelineOutcome> {
        let mut counters = RunCounters::default();

        let report = self.fetcher.fetch_all(source_urls).await?;
        counters.sources_requested = report.sources_requested;
        counters.sources_failed = report.sources_failed.len();
        counters.items_fetched = report.raw_count;
        counters.items_unique = report.items.len();

        let recent = filter_recent(report.items, now, self.config.recency_window);
        counters.items_recent = recent.len();
        if recent.is_empty() {
            info!("No recent items, nothing to send");
            return Ok(PipelineOutcome { items: Vec::new(), counters });
        }

        let fresh = exclude_sent(recent, self.history.as_ref(), self.config.history_days).await;
        counters.items_new = fresh.len();
        counters.unique_sources = fresh
            .iter()
            .map(|item| item.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        if fresh.is_empty() {
            info!("Every recent item was already sent, nothing to send");
            return Ok(PipelineOutcome { items: Vec::new(), counters });
        }

        info!(
            "Analyzing {} items from {} sources",
            counters.items_new, counters.unique_sources
        );

        let scored = score_items(&self.oracle, fresh).await;
        counters.items_scored = scored.len();

        let limit = candidate_count(self.config.top_n, self.config.candidate_multiplier, scored.len());
        let annotated = annotate_top(&self.oracle, scored, limit).await;
        counters.items_annotated = annotated.len();

        let selector = DiversitySelector::new(self.config.top_n, self.config.category_cap);
        let selected = selector.select(annotated);
        if selected.is_empty() {
            info!("Selection came back empty, nothing to send");
            return Ok(PipelineOutcome { items: Vec::new(), counters });
        }

        let items = summarize_selected(&self.oracle, selected).await;
        counters.items_selected = items.len();

        info!(
            "Pipeline finished: {} fetched, {} unique, {} recent, {} new, {} selected",
            counters.items_fetched,
            counters.items_unique,
            counters.items_recent,
            counters.items_new,
            counters.items_selected
        );
        Ok(PipelineOutcome { items, counters })
    }
}
