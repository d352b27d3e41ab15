use crate::types::{CandidateItem, HistoryStore};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Keep items published after `now - window`.
///
/// Items without a timestamp, or with the zero (epoch) timestamp some feeds
/// emit, are kept: a missing date is read as "assume recent".
pub fn filter_recent(items: Vec<CandidateItem>, now: DateTime<Utc>, window: Duration) -> Vec<CandidateItem> {
    let cutoff = now - window;
    let before = items.len();

    let kept: Vec<_> = items
        .into_iter()
        .filter(|item| match item.published {
            None => true,
            Some(published) if published.timestamp() == 0 => true,
            Some(published) => published > cutoff,
        })
        .collect();

    info!("Recency filter kept {}/{} items (cutoff {})", kept.len(), before, cutoff);
    kept
}

/// Drop items whose link went out in a digest during the last `days` days.
///
/// A failing history lookup does not stop the run: the items pass through
/// unfiltered and a warning is logged.
pub async fn exclude_sent(
    items: Vec<CandidateItem>,
    history: &dyn HistoryStore,
    days: u32,
) -> Vec<CandidateItem> {
    let sent = match history.recent_links(days).await {
        Ok(sent) => sent,
        Err(e) => {
            warn!("Could not load send history, skipping exclusion: {:#}", e);
            return items;
        }
    };

    let before = items.len();
    let kept: Vec<_> = items
        .into_iter()
        .filter(|item| {
            let already_sent = sent.contains(&item.link);
            if already_sent {
                debug!("Excluding previously sent item: {}", item.link);
            }
            !already_sent
        })
        .collect();

    info!(
        "History filter kept {}/{} items ({} links sent in the last {} days)",
        kept.len(),
        before,
        sent.len(),
        days
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(link: &str, published: Option<DateTime<Utc>>) -> CandidateItem {
        CandidateItem {
            title: link.to_string(),
            description: String::new(),
            content: String::new(),
            link: link.to_string(),
            source: "Feed".to_string(),
            published,
        }
    }

    #[test]
    fn epoch_timestamp_counts_as_unset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let kept = filter_recent(vec![item("a", Some(epoch))], now, Duration::hours(24));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let exactly = now - Duration::hours(24);
        let kept = filter_recent(vec![item("a", Some(exactly))], now, Duration::hours(24));
        assert!(kept.is_empty());
    }
}
