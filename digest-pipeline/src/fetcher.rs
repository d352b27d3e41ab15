use crate::parser::FeedParser;
use crate::types::{CandidateItem, FetchConfig, PipelineError, Result, SourceError};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Retrieves the raw bytes of one feed.
///
/// Per-source timeouts and transport retries live behind this trait.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpTransport {
    client: Client,
    config: FetchConfig,
}

impl HttpTransport {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(PipelineError::FeedTooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response.bytes().await?;
        if body.len() > limit {
            return Err(PipelineError::FeedTooLarge {
                size_mb: body.len() / (1024 * 1024),
            });
        }
        Ok(body.to_vec())
    }
}

fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::HttpStatus { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        PipelineError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let retry_delay = Duration::from_secs(self.config.retry_delay_seconds);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: retry_delay,
            initial_interval: retry_delay,
            max_interval: retry_delay * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(retry_delay * 60),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, url, e, delay);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Merged result of fetching every source once.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Unique items, first occurrence wins.
    pub items: Vec<CandidateItem>,
    /// Items parsed across all sources before dedup.
    pub raw_count: usize,
    pub sources_requested: usize,
    pub sources_failed: Vec<SourceError>,
}

pub struct Fetcher {
    transport: Arc<dyn FeedTransport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn FeedTransport>) -> Self {
        Self { transport }
    }

    pub fn with_http(config: FetchConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Fetch and parse every source concurrently, one task per source.
    ///
    /// Results are merged in task completion order, so which duplicate wins
    /// is not stable across runs. Fails only when sources were requested and
    /// not a single one succeeded.
    pub async fn fetch_all(&self, urls: &[String]) -> Result<FetchReport> {
        info!("Fetching {} sources", urls.len());

        let mut tasks = JoinSet::new();
        for url in urls {
            let transport = Arc::clone(&self.transport);
            let url = url.clone();
            tasks.spawn(async move {
                let result = fetch_source(transport.as_ref(), &url).await;
                (url, result)
            });
        }

        let mut report = FetchReport {
            sources_requested: urls.len(),
            ..Default::default()
        };
        let mut merged = Vec::new();
        let mut succeeded = 0;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, Ok(items))) => {
                    info!("Fetched {} items from {}", items.len(), url);
                    succeeded += 1;
                    merged.extend(items);
                }
                Ok((url, Err(e))) => {
                    error!("Failed to fetch {}: {}", url, e);
                    report.sources_failed.push(SourceError::new(&url, e));
                }
                Err(e) => {
                    error!("Fetch task failed: {}", e);
                    report.sources_failed.push(SourceError::new("(task panicked)", e));
                }
            }
        }

        if !urls.is_empty() && succeeded == 0 {
            return Err(PipelineError::AllSourcesFailed(report.sources_failed));
        }

        report.raw_count = merged.len();
        report.items = dedup_by_link(merged);
        info!(
            "Fetched {} items ({} unique) from {}/{} sources",
            report.raw_count,
            report.items.len(),
            succeeded,
            urls.len()
        );
        Ok(report)
    }
}

async fn fetch_source(transport: &dyn FeedTransport, url: &str) -> Result<Vec<CandidateItem>> {
    let body = transport.fetch(url).await?;
    FeedParser::parse_feed(url, &body)
}

/// Keep the first item seen for each link.
pub fn dedup_by_link(items: Vec<CandidateItem>) -> Vec<CandidateItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.link.clone()))
        .collect()
}
