use crate::llm_adapter::{Classification, ItemOracle};
use crate::types::{AnnotatedItem, ScoredItem};
use tracing::{debug, info, warn};

/// How many of the best scored items are worth classifying.
pub fn candidate_count(top_n: usize, multiplier: usize, available: usize) -> usize {
    top_n.saturating_mul(multiplier).min(available)
}

/// Classify the first `limit` items of an already sorted list.
///
/// The rest are dropped: they have no realistic chance of selection.
pub async fn annotate_top<O: ItemOracle + ?Sized>(
    oracle: &O,
    scored: Vec<ScoredItem>,
    limit: usize,
) -> Vec<AnnotatedItem> {
    info!("Extracting tags for top {} of {} scored items", limit.min(scored.len()), scored.len());

    let mut annotated = Vec::with_capacity(limit.min(scored.len()));
    for scored in scored.into_iter().take(limit) {
        let Classification { category, tags } = match oracle.classify(&scored.item).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Failed to classify '{}', using defaults: {}", scored.item.title, e);
                Classification::default()
            }
        };
        debug!("{} -> {} {:?}", scored.item.title, category, tags);
        annotated.push(AnnotatedItem {
            scored,
            category,
            tags,
        });
    }
    annotated
}
