use crate::types::{CandidateItem, PipelineError, Result};
use feed_rs::parser;
use tracing::debug;
use url::Url;

/// Turns a raw RSS/Atom/JSON feed document into candidate items.
pub struct FeedParser;

impl FeedParser {
    /// Parse `content` fetched from `feed_url`.
    ///
    /// Entries without a link are dropped since the link is the identity of
    /// an item. The source name is the feed title, or the feed host when the
    /// feed has no title.
    pub fn parse_feed(feed_url: &str, content: &[u8]) -> Result<Vec<CandidateItem>> {
        debug!("Parsing feed content from {} ({} bytes)", feed_url, content.len());

        let feed = parser::parse(content)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse feed: {}", e)))?;

        let source = feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_source_name(feed_url));

        let mut items = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            if let Some(item) = Self::parse_entry(entry, &source) {
                items.push(item);
            }
        }

        debug!("Parsed {} entries from {}", items.len(), source);
        Ok(items)
    }

    fn parse_entry(entry: feed_rs::model::Entry, source: &str) -> Option<CandidateItem> {
        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let Some(link) = entry.links.first().map(|l| canonical_link(&l.href)) else {
            debug!("Skipping entry without link: {}", title);
            return None;
        };
        if link.is_empty() {
            debug!("Skipping entry with empty link: {}", title);
            return None;
        }

        let description = entry
            .summary
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        // Prefer the full body; feeds that only ship a description get that twice
        let content = entry
            .content
            .and_then(|c| c.body)
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| description.clone());

        Some(CandidateItem {
            title,
            description,
            content,
            link,
            source: source.to_string(),
            published: entry.published.or(entry.updated),
        })
    }
}

/// Normalise a link into the key used for dedup and send history.
///
/// Whitespace and the fragment are dropped and scheme/host are lowercased by
/// the URL parser. Links that do not parse are kept as trimmed text.
pub fn canonical_link(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

fn fallback_source_name(feed_url: &str) -> String {
    Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| feed_url.to_string())
}
