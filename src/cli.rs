// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// There is one positional argument, the starting directory URL, and a set of
// flags that map one-to-one onto CrawlConfig (see to_config below).
// =============================================================================

use crate::config::{
    CrawlConfig, FetchConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_DEPTH, DEFAULT_USER_AGENT,
    DEFAULT_WORKERS,
};
use crate::fetch::{Backoff, RetryPolicy};
use crate::output::OutputFormat;
use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "dirranger",
    version,
    about = "Print every URL reachable from an open directory index, one per line",
    long_about = "dirranger walks Apache, nginx and lighttpd autoindex pages starting from a \
                  directory URL and prints every file and subdirectory URL it finds. \
                  URLs go to stdout, warnings go to stderr, so the output can be piped."
)]
pub struct Cli {
    /// Starting directory URL (e.g., http://host/vendor/)
    pub url: String,

    /// Maximum recursion depth; directories at this depth are printed but not listed
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: usize,

    /// HTTP timeout per request, in seconds
    #[arg(long, default_value_t = 8.0)]
    pub timeout: f64,

    /// Suppress warnings and diagnostics on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not deduplicate printed URLs (lower memory)
    #[arg(long)]
    pub no_dedupe: bool,

    /// Number of directories fetched concurrently (1 = strict discovery order)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Attempts per directory on timeouts and refused connections
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value_t = 300)]
    pub retry_delay: u64,

    /// Keep the retry delay constant instead of doubling it
    #[arg(long)]
    pub fixed_delay: bool,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Largest listing body accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body: usize,

    /// Print one JSON object per line ({"url","name","kind","depth"}) instead of bare URLs
    #[arg(long)]
    pub json: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn to_config(&self) -> Result<CrawlConfig> {
        let timeout = match Duration::try_from_secs_f64(self.timeout) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => bail!("--timeout must be a positive number of seconds, got {}", self.timeout),
        };

        if self.max_body == 0 {
            bail!("--max-body must be greater than zero");
        }

        let backoff = if self.fixed_delay {
            Backoff::Fixed
        } else {
            Backoff::Exponential
        };

        Ok(CrawlConfig {
            max_depth: self.depth,
            dedupe: !self.no_dedupe,
            workers: self.workers,
            fetch: FetchConfig {
                timeout,
                user_agent: self.user_agent.clone(),
                max_body_bytes: self.max_body,
            },
            retry: RetryPolicy::new(self.attempts, Duration::from_millis(self.retry_delay), backoff),
        })
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Plain
        }
    }
}
