pub mod types;
pub mod retry;
pub mod parser;
pub mod fetcher;
pub mod filters;
pub mod llm_adapter;
pub mod remote_oracle;
pub mod scoring;
pub mod tagging;
pub mod selection;
pub mod summarizer;
pub mod pipeline;
pub mod digest;
pub mod store;
pub mod sink;

pub use types::*;
pub use retry::{Clock, RateLimiter, RetryPolicy, TokioClock};
pub use parser::{canonical_link, FeedParser};
pub use fetcher::{FeedTransport, FetchReport, Fetcher, HttpTransport};
pub use llm_adapter::{Classification, ItemOracle, MockOracle, OracleClient};
pub use remote_oracle::RemoteOracle;
pub use selection::{is_duplicate_topic, DiversitySelector};
pub use summarizer::SUMMARY_FALLBACK;
pub use pipeline::{DigestPipeline, PipelineOutcome};
pub use digest::{assemble_digest, subject_line};
pub use store::PgStore;
pub use sink::{JsonSink, PreviewSink};
