// src/fetch/mod.rs
// =============================================================================
// Network access for the crawler.
//
// Submodules:
// - http: one GET with timeout, User-Agent and body cap
// - retry: bounded retries with fixed or exponential delay
// =============================================================================

mod http;
mod retry;

pub use http::{Fetcher, Response};
pub use retry::{Backoff, RetryPolicy};
