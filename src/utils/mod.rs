//! Utility modules supporting resolution.
//!
//! - [`normalize`], [`similarity`], [`best_match`]: title matching at
//!   [`MATCH_THRESHOLD`]
//! - [`normalize_doi`], [`strip_pdf_version`], [`year_from_date`]: identifier cleanup
//! - [`RetryPolicy`] and [`execute`]: per-provider pacing and retry strategies
//! - [`RateLimiter`]: minimum interval between requests
//! - [`Clock`]: time source, swappable for [`ManualClock`] in tests
//! - [`HttpClient`]: reqwest wrapper with status classification
//! - [`ResolutionCache`]: bounded in-memory cache of resolved papers
//!
//! # Title matching
//!
//! ```rust
//! use research_resolve::utils::{is_match, similarity};
//!
//! let score = similarity(
//!     "Attention Is All You Need",
//!     "attention is all you need.",
//! );
//! assert!(is_match(score));
//! ```
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use research_resolve::sources::SourceError;
//! use research_resolve::utils::{execute, BackoffPolicy};
//! use std::time::Duration;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let policy = BackoffPolicy::new(Duration::from_secs(1), 3);
//! let result = execute(&policy, "openalex", || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod clock;
mod http;
mod ids;
mod logging;
mod rate_limit;
mod retry;
mod title;

pub use cache::{CacheResult, ResolutionCache};
pub use clock::{Clock, ManualClock, TokioClock};
pub use http::HttpClient;
pub use ids::{
    arxiv_id_from_url, normalize_doi, strip_doi_version, strip_pdf_version, year_from_date,
};
pub use logging::init_logging;
pub use rate_limit::RateLimiter;
pub use retry::{
    execute, BackoffPolicy, FixedDelayPolicy, MinIntervalPolicy, PreRequestBackoffPolicy,
    RetryDecision, RetryPolicy,
};
pub use title::{best_match, clean_for_query, is_match, normalize, similarity, MATCH_THRESHOLD};
