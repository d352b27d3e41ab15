#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use digest_pipeline::{
    AnnotatedItem, CandidateItem, Clock, FeedTransport, Oracle, OracleConfig, OracleError,
    PipelineError, ScoredItem,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Virtual clock: `sleep` returns at once, records the duration and moves
/// virtual time forward by it.
pub struct FakeClock {
    start: Instant,
    state: Mutex<FakeClockState>,
}

#[derive(Default)]
struct FakeClockState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            state: Mutex::new(FakeClockState::default()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.state.lock().unwrap().elapsed += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().unwrap().sleeps.clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.state.lock().unwrap().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.sleeps.push(duration);
        state.elapsed += duration;
    }
}

/// Oracle settings with no pacing, so sleeps seen by the clock are backoff only.
pub fn unpaced_config() -> OracleConfig {
    OracleConfig {
        min_interval: Duration::ZERO,
        ..Default::default()
    }
}

/// Serves feed documents from memory. Unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryTransport {
    feeds: HashMap<String, String>,
    failing: HashSet<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: &str, body: String) -> Self {
        self.feeds.insert(url.to_string(), body);
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl FeedTransport for MemoryTransport {
    async fn fetch(&self, url: &str) -> digest_pipeline::Result<Vec<u8>> {
        if self.failing.contains(url) {
            return Err(PipelineError::HttpStatus { status: 503 });
        }
        self.feeds
            .get(url)
            .map(|body| body.as_bytes().to_vec())
            .ok_or(PipelineError::HttpStatus { status: 404 })
    }
}

pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn new(title: &str, link: &str, published: Option<DateTime<Utc>>) -> Self {
        Self {
            title: title.to_string(),
            link: link.to_string(),
            published,
        }
    }
}

/// Minimal RSS 2.0 document.
pub fn rss_feed(title: &str, entries: &[FeedEntry]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n<title>{}</title>\n<link>https://example.com</link>\n<description>Test feed</description>\n",
        title
    );
    for entry in entries {
        xml.push_str("<item>\n");
        xml.push_str(&format!("<title>{}</title>\n", entry.title));
        xml.push_str(&format!("<link>{}</link>\n", entry.link));
        xml.push_str(&format!(
            "<description>About {}. More detail follows.</description>\n",
            entry.title
        ));
        if let Some(published) = entry.published {
            xml.push_str(&format!("<pubDate>{}</pubDate>\n", published.to_rfc2822()));
        }
        xml.push_str("</item>\n");
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}

/// Prompt-level oracle answering from per-title scripts.
///
/// Queued errors are returned first, one per call, before any scripted
/// answer. Every prompt received is recorded.
#[derive(Default)]
pub struct ScriptedOracle {
    scores: HashMap<String, String>,
    categories: HashMap<String, String>,
    failing_summaries: HashSet<String>,
    blank_summaries: HashSet<String>,
    queued_errors: Mutex<VecDeque<OracleError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(mut self, title: &str, answer: &str) -> Self {
        self.scores.insert(title.to_string(), answer.to_string());
        self
    }

    pub fn category(mut self, title: &str, category: &str) -> Self {
        self.categories.insert(title.to_string(), category.to_string());
        self
    }

    pub fn failing_summary(mut self, title: &str) -> Self {
        self.failing_summaries.insert(title.to_string());
        self
    }

    pub fn blank_summary(mut self, title: &str) -> Self {
        self.blank_summaries.insert(title.to_string());
        self
    }

    pub fn queue_errors(self, errors: impl IntoIterator<Item = OracleError>) -> Self {
        self.queued_errors.lock().unwrap().extend(errors);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

fn title_of(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Title: "))
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(error) = self.queued_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        let title = title_of(prompt);
        if prompt.starts_with("Rate the following article") {
            return Ok(self.scores.get(&title).cloned().unwrap_or_else(|| "5".to_string()));
        }
        if prompt.starts_with("Analyze this article") {
            let category = self
                .categories
                .get(&title)
                .cloned()
                .unwrap_or_else(|| "General".to_string());
            return Ok(format!("Category: {}\nTags: [alpha, beta]", category));
        }
        if prompt.starts_with("Summarize the following article") {
            if self.failing_summaries.contains(&title) {
                return Err(OracleError::Request("summary backend down".to_string()));
            }
            if self.blank_summaries.contains(&title) {
                return Ok("   ".to_string());
            }
            return Ok(format!("{} in one sentence.", title));
        }
        Err(OracleError::InvalidResponse(format!("unexpected prompt: {}", prompt)))
    }
}

pub fn candidate(title: &str, link: &str) -> CandidateItem {
    CandidateItem {
        title: title.to_string(),
        description: format!("About {}.", title),
        content: format!("About {}.", title),
        link: link.to_string(),
        source: "Test Feed".to_string(),
        published: None,
    }
}

pub fn scored(title: &str, score: f64) -> ScoredItem {
    let link = format!("https://example.com/{}", title.to_lowercase().replace(' ', "-"));
    ScoredItem {
        item: candidate(title, &link),
        score,
    }
}

pub fn annotated(title: &str, category: &str, score: f64) -> AnnotatedItem {
    let link = format!("https://example.com/{}", title.to_lowercase().replace(' ', "-"));
    AnnotatedItem {
        scored: ScoredItem {
            item: candidate(title, &link),
            score,
        },
        category: category.to_string(),
        tags: vec!["tech".to_string()],
    }
}
