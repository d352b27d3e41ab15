mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{init_tracing, rss_feed, FakeClock, FeedEntry, MemoryTransport, ScriptedOracle};
use digest_pipeline::{
    assemble_digest, DigestPipeline, Fetcher, OracleClient, OracleConfig, PipelineConfig,
    PipelineError, Result, SUMMARY_FALLBACK,
};
use interfaces::{DigestArchive, HistoryStore, MemoryArchive, MemoryHistory};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

const ALPHA: &str = "https://alpha.example.com/feed";
const BETA: &str = "https://beta.example.com/feed";
const GAMMA: &str = "https://gamma.example.com/feed";

/// (key, title, category, score) for every article that survives both filters.
const SURVIVORS: &[(&str, &str, &str, &str)] = &[
    ("a0", "Transformers rewrite attention kernels", "AI/ML", "9.5"),
    ("a1", "Vector database benchmarks published", "AI/ML", "7.5"),
    ("a2", "OpenSSL patches certificate flaw", "Security", "7"),
    ("a3", "Phishing campaign targets maintainers", "Security", "5"),
    ("a4", "Kubernetes autoscaler gains predictive mode", "DevOps", "8.5"),
    ("a5", "Terraform drift detection improved", "DevOps", "4.5"),
    ("b0", "Robotics startup releases planner", "AI/ML", "5.5"),
    ("b1", "Postgres seventeen logical replication", "Backend", "8"),
    ("c0", "Browser sandbox escape disclosed", "Security", "9"),
    ("c1", "GitOps workflows without Argo", "DevOps", "6.5"),
    ("c2", "Redis licensing fork matures", "Backend", "6"),
    ("c3", "gRPC streaming backpressure explained", "Backend", "4"),
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 7, 6, 0, 0).unwrap()
}

fn link(key: &str) -> String {
    let host = match &key[..1] {
        "a" => "alpha",
        "b" => "beta",
        _ => "gamma",
    };
    format!("https://{}.example.com/posts/{}", host, key)
}

fn title(key: &str) -> String {
    SURVIVORS
        .iter()
        .find(|(k, ..)| *k == key)
        .map(|(_, t, ..)| t.to_string())
        .unwrap_or_else(|| format!("Archived note {}", key))
}

fn entry(key: &str, published: Option<DateTime<Utc>>) -> FeedEntry {
    FeedEntry::new(&title(key), &link(key), published)
}

/// 10 + 5 + 8 raw items. Beta re-publishes a0 and a1. Six items are two days
/// old and a0 carries no date at all.
fn transport() -> MemoryTransport {
    let fresh = Some(now() - Duration::hours(1));
    let stale = Some(now() - Duration::hours(48));

    let mut alpha = vec![entry("a0", None)];
    alpha.extend(["a1", "a2", "a3", "a4", "a5", "a6", "a7"].iter().map(|k| entry(k, fresh)));
    alpha.extend(["a8", "a9"].iter().map(|k| entry(k, stale)));

    let beta = vec![
        entry("b0", fresh),
        entry("b1", fresh),
        entry("b2", stale),
        entry("a0", None),
        entry("a1", fresh),
    ];

    let mut gamma: Vec<_> = ["c0", "c1", "c2", "c3", "c4"].iter().map(|k| entry(k, fresh)).collect();
    gamma.extend(["c5", "c6", "c7"].iter().map(|k| entry(k, stale)));

    MemoryTransport::new()
        .with_feed(ALPHA, rss_feed("Alpha Engineering", &alpha))
        .with_feed(BETA, rss_feed("Beta Daily", &beta))
        .with_feed(GAMMA, rss_feed("Gamma Weekly", &gamma))
}

fn scripted_oracle() -> ScriptedOracle {
    let mut oracle = ScriptedOracle::new();
    for (_, title, category, score) in SURVIVORS {
        oracle = oracle.score(title, score).category(title, category);
    }
    oracle.failing_summary("Redis licensing fork matures")
}

fn pipeline(history: Arc<dyn HistoryStore>, oracle: ScriptedOracle) -> DigestPipeline<OracleClient<ScriptedOracle>> {
    let clock = Arc::new(FakeClock::new());
    let client = OracleClient::with_clock(oracle, &OracleConfig::default(), clock);
    let config = PipelineConfig {
        top_n: 8,
        category_cap: 2,
        ..Default::default()
    };
    DigestPipeline::new(config, Fetcher::new(Arc::new(transport())), history, client)
}

fn sources() -> Vec<String> {
    vec![ALPHA.to_string(), BETA.to_string(), GAMMA.to_string()]
}

#[tokio::test]
async fn test_full_pipeline_run() -> Result<()> {
    init_tracing();

    let history = Arc::new(MemoryHistory::from_links([link("a6"), link("a7"), link("c4")]));
    let pipeline = pipeline(history, scripted_oracle());

    let outcome = pipeline.run_at(&sources(), now()).await?;
    let c = &outcome.counters;
    info!("Counters: {:?}", c);

    assert_eq!(c.sources_requested, 3);
    assert_eq!(c.sources_failed, 0);
    assert_eq!(c.items_fetched, 23);
    assert_eq!(c.items_unique, 21, "two overlapping links");
    assert_eq!(c.items_recent, 15, "six stale items dropped");
    assert_eq!(c.items_new, 12, "three previously sent links dropped");
    assert_eq!(c.unique_sources, 3);
    assert_eq!(c.items_scored, 12);
    assert_eq!(c.items_annotated, 12);
    assert_eq!(c.items_selected, 8);

    let oracle = pipeline.oracle().oracle();
    assert_eq!(oracle.calls_starting_with("Rate the following article"), 12);
    assert_eq!(oracle.calls_starting_with("Analyze this article"), 12);
    assert_eq!(oracle.calls_starting_with("Summarize the following article"), 8);

    let titles: Vec<_> = outcome.items.iter().map(|item| item.title()).collect();
    assert_eq!(
        titles,
        vec![
            "Transformers rewrite attention kernels",
            "Browser sandbox escape disclosed",
            "Kubernetes autoscaler gains predictive mode",
            "Postgres seventeen logical replication",
            "Vector database benchmarks published",
            "OpenSSL patches certificate flaw",
            "GitOps workflows without Argo",
            "Redis licensing fork matures",
        ]
    );

    let mut per_category: HashMap<&str, usize> = HashMap::new();
    for item in &outcome.items {
        *per_category.entry(item.category()).or_default() += 1;
        assert!(!item.summary.is_empty());
        assert!(!item.tags().is_empty());
    }
    assert_eq!(per_category.len(), 4);
    assert!(per_category.values().all(|&count| count == 2));

    let positions: Vec<_> = outcome.items.iter().map(|item| item.position).collect();
    assert_eq!(positions, (1..=8).collect::<Vec<_>>());

    let redis = &outcome.items[7];
    assert_eq!(redis.summary, SUMMARY_FALLBACK);
    assert_eq!(
        outcome.items[0].summary,
        "Transformers rewrite attention kernels in one sentence."
    );

    let excluded: HashSet<_> = [link("a6"), link("a7"), link("c4")].into_iter().collect();
    assert!(outcome.items.iter().all(|item| !excluded.contains(item.link())));

    Ok(())
}

#[tokio::test]
async fn test_archived_run_feeds_next_history() -> Result<()> {
    init_tracing();

    let archive = Arc::new(MemoryArchive::new());
    let first = pipeline(archive.clone(), scripted_oracle());
    let outcome = first.run_at(&sources(), now()).await?;

    // The archive answers history relative to the wall clock
    let run = assemble_digest(outcome, "The Paper", Utc::now()).expect("first run selects items");
    assert_eq!(run.items.len(), 8);
    assert!(run.subject.starts_with("The Paper - "));
    archive.record(&run).await.expect("in-memory archive never fails");

    // The same feeds again: everything sent last time is now excluded
    let second = pipeline(archive.clone(), scripted_oracle());
    let outcome = second.run_at(&sources(), now()).await?;

    assert_eq!(outcome.counters.items_new, 15 - 8);
    let sent: HashSet<_> = run.items.iter().map(|item| item.link().to_string()).collect();
    assert!(outcome.items.iter().all(|item| !sent.contains(item.link())));

    Ok(())
}

#[tokio::test]
async fn test_nothing_recent_means_nothing_to_send() -> Result<()> {
    init_tracing();

    let history = Arc::new(MemoryHistory::new());
    let oracle = scripted_oracle();
    let pipeline = pipeline(history, oracle);

    // A week later every dated item is stale; only the undated a0 remains
    let later = now() + Duration::days(7);
    let outcome = pipeline.run_at(&sources(), later).await?;
    assert_eq!(outcome.counters.items_recent, 1);
    assert_eq!(outcome.items.len(), 1);

    let history = Arc::new(MemoryHistory::from_links([link("a0")]));
    let pipeline = self::pipeline(history, scripted_oracle());
    let outcome = pipeline.run_at(&sources(), later).await?;
    assert!(outcome.is_empty());
    assert_eq!(outcome.counters.items_new, 0);
    assert_eq!(pipeline.oracle().oracle().calls(), 0, "no oracle calls for an empty run");
    assert!(assemble_digest(outcome, "The Paper", later).is_none());

    Ok(())
}

#[tokio::test]
async fn test_run_fails_only_when_every_source_fails() {
    init_tracing();

    let clock = Arc::new(FakeClock::new());
    let client = OracleClient::with_clock(ScriptedOracle::new(), &OracleConfig::default(), clock);
    let transport = MemoryTransport::new().with_failure(ALPHA).with_failure(BETA);
    let pipeline = DigestPipeline::new(
        PipelineConfig::default(),
        Fetcher::new(Arc::new(transport)),
        Arc::new(MemoryHistory::new()),
        client,
    );

    let result = pipeline
        .run_at(&[ALPHA.to_string(), BETA.to_string()], now())
        .await;
    assert!(matches!(result, Err(PipelineError::AllSourcesFailed(ref errors)) if errors.len() == 2));
}
