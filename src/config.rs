// src/config.rs
// =============================================================================
// Every knob a crawl can be tuned with, in one place.
//
// The CLI builds a CrawlConfig from its flags (see Cli::to_config); tests
// build one directly with struct update syntax:
//
//   CrawlConfig { max_depth: 2, workers: 1, ..CrawlConfig::default() }
// =============================================================================

use crate::fetch::{Backoff, RetryPolicy};
use std::time::Duration;

/// Default recursion limit, counted in directory hops from the seed
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default ceiling for a listing body (8 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// User-Agent sent with every request unless overridden
pub const DEFAULT_USER_AGENT: &str = concat!("dirranger/", env!("CARGO_PKG_VERSION"));

/// Settings for a single HTTP attempt
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Settings for a whole crawl
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Directories at this depth are emitted but never listed
    pub max_depth: usize,
    /// When false, nothing is recorded and every discovery is emitted
    pub dedupe: bool,
    /// Size of the worker pool; 1 gives strict FIFO order
    pub workers: usize,
    pub fetch: FetchConfig,
    pub retry: RetryPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            dedupe: true,
            workers: DEFAULT_WORKERS,
            fetch: FetchConfig::default(),
            retry: RetryPolicy::new(3, Duration::from_millis(300), Backoff::Exponential),
        }
    }
}

impl CrawlConfig {
    /// Worker count with the lower bound applied
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}
