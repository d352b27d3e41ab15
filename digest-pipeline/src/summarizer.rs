use crate::llm_adapter::ItemOracle;
use crate::types::{AnnotatedItem, SelectedItem};
use tracing::{info, warn};

pub const SUMMARY_FALLBACK: &str = "Summary unavailable.";

/// Attach a one-sentence summary to each selected item, keeping the
/// selector's order and numbering positions from 1.
pub async fn summarize_selected<O: ItemOracle + ?Sized>(
    oracle: &O,
    selected: Vec<AnnotatedItem>,
) -> Vec<SelectedItem> {
    info!("Summarizing {} selected items", selected.len());

    let mut summarized = Vec::with_capacity(selected.len());
    for (index, annotated) in selected.into_iter().enumerate() {
        let summary = match oracle.summarize(&annotated.scored.item).await {
            Ok(summary) if !summary.is_empty() => summary,
            Ok(_) => {
                warn!("Empty summary for '{}', using fallback", annotated.title());
                SUMMARY_FALLBACK.to_string()
            }
            Err(e) => {
                warn!("Failed to summarize '{}': {}", annotated.title(), e);
                SUMMARY_FALLBACK.to_string()
            }
        };

        summarized.push(SelectedItem {
            annotated,
            summary,
            position: index + 1,
        });
    }
    summarized
}
