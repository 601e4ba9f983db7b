// src/crawl/mod.rs
// =============================================================================
// This module walks an autoindex tree.
//
// Features:
// - Explicit FIFO frontier shared by a pool of workers (queue.rs)
// - One visited set as the only deduplication point (visited.rs)
// - Depth limit counted in directory hops from the seed
// - Per-directory failures are logged and skipped, never fatal (engine.rs)
// =============================================================================

mod engine;
mod queue;
mod visited;

pub use engine::{crawl, CrawlContext, CrawlSummary};
