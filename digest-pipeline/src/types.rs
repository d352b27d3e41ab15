use std::time::Duration;

// Use the interfaces crate for the data model and collaborator contracts
pub use interfaces::defs::{
    AnnotatedItem, CandidateItem, DigestArchive, DigestRun, DigestSink, FeedSource, HistoryStore,
    Oracle, OracleError, RunCounters, ScoredItem, SelectedItem, SourceRegistry,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Digest-Pipeline/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Minimum spacing between two outbound calls.
    pub min_interval: Duration,
    /// Total calls per request, the first one included.
    pub max_attempts: u32,
    /// Sleep before the first retry; doubles for every further retry.
    pub base_delay: Duration,
    pub timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                .to_string(),
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            min_interval: Duration::from_millis(200),
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_n: usize,
    pub category_cap: usize,
    pub recency_window: chrono::Duration,
    pub history_days: u32,
    /// Only the best `top_n * candidate_multiplier` scored items get tagged.
    pub candidate_multiplier: usize,
    pub subject_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: 8,
            category_cap: 2,
            recency_window: chrono::Duration::hours(24),
            history_days: 30,
            candidate_multiplier: 3,
            subject_prefix: "The Paper".to_string(),
        }
    }
}

/// A single source that could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{url}: {reason}")]
pub struct SourceError {
    pub url: String,
    pub reason: String,
}

impl SourceError {
    pub fn new(url: &str, reason: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("all {} sources failed: {}", .0.len(), join_source_errors(.0))]
    AllSourcesFailed(Vec<SourceError>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_source_errors(errors: &[SourceError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PipelineError>;
