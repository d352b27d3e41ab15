use crate::llm_adapter::ItemOracle;
use crate::types::{CandidateItem, ScoredItem};
use tracing::{debug, info, warn};

/// Score every item, one oracle call at a time, and sort best first.
///
/// A failed call leaves the item at 0. Equal scores keep their input order.
pub async fn score_items<O: ItemOracle + ?Sized>(oracle: &O, items: Vec<CandidateItem>) -> Vec<ScoredItem> {
    info!("Scoring {} items", items.len());
    let total = items.len();

    let mut scored = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        let score = match oracle.score(&item).await {
            Ok(score) => {
                debug!("[{}/{}] {:.1} {}", index + 1, total, score, item.title);
                score
            }
            Err(e) => {
                warn!("Failed to score '{}': {}", item.title, e);
                0.0
            }
        };
        scored.push(ScoredItem { item, score });
    }

    sort_by_score(&mut scored);
    scored
}

/// Stable descending sort.
pub fn sort_by_score(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}
