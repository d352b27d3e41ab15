use crate::retry::{Clock, RateLimiter, RetryPolicy, TokioClock};
use crate::types::{CandidateItem, Oracle, OracleConfig, OracleError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_TAG: &str = "tech";

pub const CATEGORIES: &[&str] = &[
    "AI/ML",
    "Web Development",
    "Backend",
    "DevOps",
    "Mobile",
    "Security",
    "Data",
    "Cloud",
    "Open Source",
    "Career",
    "General",
];

/// Category and tags the oracle assigned to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub tags: Vec<String>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            tags: vec![DEFAULT_TAG.to_string()],
        }
    }
}

/// Typed view over the oracle: one method per kind of question.
///
/// Implementations own prompt construction and response parsing, so the
/// pipeline stages never look at raw oracle text.
#[async_trait]
pub trait ItemOracle: Send + Sync {
    /// Relevance in [0, 10].
    async fn score(&self, item: &CandidateItem) -> Result<f64, OracleError>;

    async fn classify(&self, item: &CandidateItem) -> Result<Classification, OracleError>;

    /// One-sentence summary, returned verbatim.
    async fn summarize(&self, item: &CandidateItem) -> Result<String, OracleError>;
}

/// Paced, retrying client shared by the scorer, the tag extractor and the
/// summariser.
///
/// The limiter is the only mutable state. It lives inside the client, so two
/// clients never pace each other.
pub struct OracleClient<O> {
    oracle: O,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    retry: RetryPolicy<OracleError>,
}

impl<O: Oracle> OracleClient<O> {
    pub fn new(oracle: O, config: &OracleConfig) -> Self {
        Self::with_clock(oracle, config, Arc::new(TokioClock))
    }

    pub fn with_clock(oracle: O, config: &OracleConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::new(config.min_interval, clock.as_ref());
        let retry = RetryPolicy::new(config.max_attempts, config.base_delay, OracleError::is_transient);
        Self {
            oracle,
            clock,
            limiter,
            retry,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn retry_policy(&self) -> &RetryPolicy<OracleError> {
        &self.retry
    }

    async fn call(&self, label: &str, prompt: &str) -> Result<String, OracleError> {
        let oracle = &self.oracle;
        let limiter = &self.limiter;
        let clock = self.clock.as_ref();

        self.retry
            .run(clock, label, move || async move {
                limiter.pace(clock).await;
                oracle.complete(prompt).await
            })
            .await
    }
}

#[async_trait]
impl<O: Oracle> ItemOracle for OracleClient<O> {
    async fn score(&self, item: &CandidateItem) -> Result<f64, OracleError> {
        let response = self.call("score", &score_prompt(item)).await?;
        parse_score(&response)
    }

    async fn classify(&self, item: &CandidateItem) -> Result<Classification, OracleError> {
        let response = self.call("classify", &classify_prompt(item)).await?;
        Ok(parse_classification(&response))
    }

    async fn summarize(&self, item: &CandidateItem) -> Result<String, OracleError> {
        let response = self.call("summarize", &summary_prompt(item)).await?;
        Ok(response.trim().to_string())
    }
}

pub fn score_prompt(item: &CandidateItem) -> String {
    format!(
        "Rate the following article's relevance for a daily programming and technology newsletter on a scale of 0-10.\n\
         Consider:\n\
         - Technical depth and value\n\
         - Relevance to software developers\n\
         - Timeliness and importance\n\
         - Novelty and interest\n\
         \n\
         Article:\n\
         Title: {}\n\
         Description: {}\n\
         \n\
         Respond with ONLY a number between 0 and 10. You may use half increments (e.g., 7.5, 8.5, 9.5).",
        item.title, item.description
    )
}

pub fn classify_prompt(item: &CandidateItem) -> String {
    format!(
        "Analyze this article and provide:\n\
         1. A category (ONE of: {})\n\
         2. 2-3 relevant tags (short keywords)\n\
         \n\
         Article:\n\
         Title: {}\n\
         Description: {}\n\
         \n\
         Respond in this EXACT format:\n\
         Category: [category]\n\
         Tags: [tag1, tag2, tag3]",
        CATEGORIES.join(", "),
        item.title,
        item.description
    )
}

pub fn summary_prompt(item: &CandidateItem) -> String {
    format!(
        "Summarize the following article in ONE concise sentence for a technical audience.\n\
         Focus on the single most important technical point or takeaway.\n\
         \n\
         Article:\n\
         Title: {}\n\
         Content: {}\n\
         \n\
         Summary:",
        item.title, item.content
    )
}

/// Parse a bare relevance number. Anything else, including values outside
/// [0, 10], is an invalid response.
pub fn parse_score(response: &str) -> Result<f64, OracleError> {
    let text = response.trim();
    let score: f64 = text
        .parse()
        .map_err(|_| OracleError::InvalidResponse(format!("invalid score format: {:?}", text)))?;

    if !score.is_finite() || !(0.0..=10.0).contains(&score) {
        return Err(OracleError::InvalidResponse(format!("score out of range: {}", score)));
    }
    Ok(score)
}

/// Pick the `Category:` and `Tags:` lines out of a classification answer.
/// Unrecognised lines are ignored; missing values fall back to defaults.
pub fn parse_classification(response: &str) -> Classification {
    let mut category = String::new();
    let mut tags = Vec::new();

    for line in response.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Category:") {
            category = rest.trim().trim_matches(&['[', ']'][..]).trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Tags:") {
            tags = rest
                .trim()
                .trim_matches(&['[', ']'][..])
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    let defaults = Classification::default();
    if category.is_empty() {
        debug!("No category in oracle response, using {}", DEFAULT_CATEGORY);
        category = defaults.category;
    }
    if tags.is_empty() {
        tags = defaults.tags;
    }

    Classification { category, tags }
}

/// Offline oracle that answers from simple keyword heuristics.
///
/// Lets the binary run end to end without credentials.
pub struct MockOracle;

#[async_trait]
impl Oracle for MockOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let title = prompt_field(prompt, "Title:").unwrap_or_default().to_lowercase();

        if prompt.starts_with("Rate the following article") {
            let keywords = ["rust", "release", "security", "database", "kubernetes", "ai", "compiler"];
            let hits = keywords.iter().filter(|k| title.contains(*k)).count();
            let score = (4.0 + 1.5 * hits as f64).min(10.0);
            return Ok(format!("{:.1}", score));
        }

        if prompt.starts_with("Analyze this article") {
            let category = if title.contains("security") || title.contains("cve") {
                "Security"
            } else if title.contains("ai") || title.contains("model") {
                "AI/ML"
            } else if title.contains("kubernetes") || title.contains("deploy") {
                "DevOps"
            } else {
                DEFAULT_CATEGORY
            };
            let tags: Vec<_> = title.split_whitespace().filter(|w| w.len() > 3).take(3).collect();
            return Ok(format!("Category: {}\nTags: {}", category, tags.join(", ")));
        }

        let content = prompt_field(prompt, "Content:").unwrap_or_default();
        let sentence = content.split_inclusive('.').next().unwrap_or_default().trim();
        if sentence.is_empty() {
            return Err(OracleError::InvalidResponse("nothing to summarize".to_string()));
        }
        Ok(sentence.to_string())
    }
}

fn prompt_field<'a>(prompt: &'a str, prefix: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
}
