// src/crawl/engine.rs
// =============================================================================
// This module drives the crawl.
//
// How it works:
// 1. The seed directory is recorded, emitted and queued at depth 0
// 2. A pool of workers pops directories from the shared frontier
// 3. Each directory is fetched (with retries) and parsed as a listing
// 4. Every child is recorded and emitted the moment it is discovered;
//    subdirectories below the depth limit go back into the frontier
// 5. The crawl ends when the frontier is empty and every worker is idle
//
// Per directory the outcome is one of:
// - Parsed: listed successfully, children handled
// - Unreachable: the retry policy gave up or the server said no
// - Leaf: depth limit, not a listing, or redirected somewhere we don't crawl
//
// None of these stop the crawl. Only the seed being unreachable is reported
// back to the caller as a failure (see CrawlSummary::seed_reachable).
// =============================================================================

use super::queue::{Frontier, FrontierItem};
use super::visited::VisitedSet;
use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::listing::{EntryKind, ListingParser, ParseOutcome};
use crate::output::{Discovery, Emitter};
use crate::urls::{normalize, Scope};
use futures::stream::{self, StreamExt};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};
use url::Url;

/// Terminal state of one frontier item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Parsed { directories: usize, files: usize },
    Unreachable,
    Leaf,
}

/// Counters reported at the end of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub emitted: usize,
    /// Directory and file entries emitted below the seed
    pub directories: usize,
    pub files: usize,
    pub listed: usize,
    pub leaves: usize,
    pub unreachable: usize,
    pub malformed: usize,
    /// False only when fetching the seed itself failed
    pub seed_reachable: bool,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct Counters {
    emitted: AtomicUsize,
    directories: AtomicUsize,
    files: AtomicUsize,
    listed: AtomicUsize,
    leaves: AtomicUsize,
    unreachable: AtomicUsize,
    malformed: AtomicUsize,
}

/// Everything one crawl shares between its workers.
/// Separate crawls get separate contexts and never see each other's state.
pub struct CrawlContext<'a> {
    config: CrawlConfig,
    seed: Url,
    scope: Scope,
    fetcher: Fetcher,
    parser: ListingParser,
    frontier: Frontier,
    visited: VisitedSet,
    emitter: &'a dyn Emitter,
    counters: Counters,
    seed_failed: AtomicBool,
}

impl<'a> CrawlContext<'a> {
    /// `seed` must already be a directory URL (see urls::directory_seed)
    pub fn new(config: CrawlConfig, seed: Url, emitter: &'a dyn Emitter) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new(&config.fetch)?;
        let parser = ListingParser::new().keep_duplicates(!config.dedupe);
        let visited = VisitedSet::new(config.dedupe);
        let seed = normalize(&seed);

        Ok(Self {
            scope: Scope::new(seed.clone()),
            seed,
            fetcher,
            parser,
            frontier: Frontier::new(),
            visited,
            emitter,
            counters: Counters::default(),
            seed_failed: AtomicBool::new(false),
            config,
        })
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Cooperative stop: queued directories are abandoned, in-flight ones
    /// finish without emitting anything further
    pub fn cancel(&self) {
        self.frontier.cancel();
    }

    fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            emitted: self.counters.emitted.load(Ordering::SeqCst),
            directories: self.counters.directories.load(Ordering::SeqCst),
            files: self.counters.files.load(Ordering::SeqCst),
            listed: self.counters.listed.load(Ordering::SeqCst),
            leaves: self.counters.leaves.load(Ordering::SeqCst),
            unreachable: self.counters.unreachable.load(Ordering::SeqCst),
            malformed: self.counters.malformed.load(Ordering::SeqCst),
            seed_reachable: !self.seed_failed.load(Ordering::SeqCst),
            cancelled: self.frontier.is_cancelled(),
        }
    }

    async fn process(&self, item: &FrontierItem) -> NodeOutcome {
        if item.depth >= self.config.max_depth {
            return NodeOutcome::Leaf;
        }

        let response = match self.config.retry.attempt(&self.fetcher, &item.url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    url = %item.url,
                    error = %err,
                    transient = err.last_error().is_transient(),
                    "unreachable"
                );
                if item.depth == 0 {
                    self.seed_failed.store(true, Ordering::SeqCst);
                }
                return NodeOutcome::Unreachable;
            }
        };

        // A redirect may have taken us to a file, or out of the crawl root
        let base = normalize(&response.final_url);
        if !base.path().ends_with('/') || !self.scope.contains(&base) {
            debug!(url = %item.url, landed = %base, "redirected away from a directory, not listing");
            return NodeOutcome::Leaf;
        }

        let listing = match self.parser.parse(&base, &response.body, response.content_type.as_deref()) {
            ParseOutcome::Listing(listing) => listing,
            ParseOutcome::NotAListing => {
                debug!(url = %base, "not an autoindex page");
                return NodeOutcome::Leaf;
            }
        };

        debug!(
            url = %base,
            status = response.status,
            format = listing.format.name(),
            entries = listing.entries.len(),
            "parsed listing"
        );

        for bad in &listing.malformed {
            warn!(page = %base, href = %bad.href, reason = %bad.reason, "skipping malformed entry");
            self.counters.malformed.fetch_add(1, Ordering::SeqCst);
        }

        let child_depth = item.depth + 1;
        let mut directories = 0;
        let mut files = 0;

        for entry in listing.entries {
            if !self.scope.contains(&entry.url) {
                continue;
            }
            if !self.discover(&entry.url, &entry.name, entry.kind, child_depth) {
                continue;
            }

            match entry.kind {
                EntryKind::File => files += 1,
                EntryKind::Directory => {
                    directories += 1;
                    // At the limit the directory is emitted but never listed
                    if child_depth < self.config.max_depth {
                        self.frontier.push(FrontierItem {
                            url: entry.url,
                            depth: child_depth,
                        });
                    }
                }
            }
        }

        NodeOutcome::Parsed { directories, files }
    }

    /// Records and emits a URL. Returns false if it was already seen, the
    /// crawl was cancelled, or the output is gone.
    fn discover(&self, url: &Url, name: &str, kind: EntryKind, depth: usize) -> bool {
        if self.frontier.is_cancelled() || !self.visited.try_visit(url) {
            return false;
        }

        let discovery = Discovery {
            url: url.to_string(),
            name: name.to_string(),
            kind,
            depth,
        };
        match self.emitter.emit(&discovery) {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(err) => {
                // Nobody is reading anymore (e.g. `| head`), no point going on
                if err.kind() == io::ErrorKind::BrokenPipe {
                    debug!("output closed, stopping crawl");
                } else {
                    error!(error = %err, "failed to write output, stopping crawl");
                }
                self.frontier.cancel();
                false
            }
        }
    }

    fn record(&self, outcome: NodeOutcome) {
        let counter = match outcome {
            NodeOutcome::Parsed { directories, files } => {
                self.counters.directories.fetch_add(directories, Ordering::SeqCst);
                self.counters.files.fetch_add(files, Ordering::SeqCst);
                &self.counters.listed
            }
            NodeOutcome::Unreachable => &self.counters.unreachable,
            NodeOutcome::Leaf => &self.counters.leaves,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs the crawl to completion (or cancellation) and returns its counters
pub async fn crawl(ctx: &CrawlContext<'_>) -> CrawlSummary {
    let workers = ctx.config.worker_count();
    info!(
        seed = %ctx.seed,
        max_depth = ctx.config.max_depth,
        workers,
        attempts = ctx.config.retry.max_attempts(),
        dedupe = ctx.config.dedupe,
        "starting crawl"
    );

    if ctx.discover(&ctx.seed, ctx.seed.path(), EntryKind::Directory, 0) {
        ctx.frontier.push(FrontierItem {
            url: ctx.seed.clone(),
            depth: 0,
        });
    }

    // Workers run concurrently on this task; fetch latency dominates, so
    // cooperative concurrency is all we need
    stream::iter(0..workers)
        .map(|id| worker(ctx, id))
        .buffer_unordered(workers)
        .collect::<Vec<()>>()
        .await;

    let summary = ctx.summary();
    info!(
        emitted = summary.emitted,
        directories = summary.directories,
        files = summary.files,
        listed = summary.listed,
        leaves = summary.leaves,
        unreachable = summary.unreachable,
        visited = ctx.visited.len(),
        "crawl finished"
    );
    summary
}

async fn worker(ctx: &CrawlContext<'_>, id: usize) {
    while let Some(item) = ctx.frontier.pop().await {
        debug!(worker = id, url = %item.url, depth = item.depth, queued = ctx.frontier.len(), "listing");
        let outcome = ctx.process(&item).await;
        debug!(worker = id, url = %item.url, ?outcome, "done");
        ctx.record(outcome);
        ctx.frontier.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Backoff, RetryPolicy};
    use crate::output::{LineEmitter, OutputFormat};
    use std::collections::HashSet;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn nginx_page(title: &str, hrefs: &[&str]) -> String {
        let mut body = format!(
            "<html><head><title>Index of {0}</title></head><body><h1>Index of {0}</h1><hr><pre><a href=\"../\">../</a>\n",
            title
        );
        for href in hrefs {
            body.push_str(&format!("<a href=\"{0}\">{0}</a>  01-Jan-2024 10:00  -\n", href));
        }
        body.push_str("</pre><hr></body></html>");
        body
    }

    async fn serve(server: &MockServer, at: &str, hrefs: &[&str]) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(nginx_page(at, hrefs), "text/html"))
            .mount(server)
            .await;
    }

    // /public/ -> css/ (dir), app.js, plus self/parent/escape links
    // /public/css/ -> fonts/ (dir), site.css
    // /public/css/fonts/ -> a.woff
    async fn public_tree() -> MockServer {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["css/", "app.js", "./", ".", "../", "/other/"]).await;
        serve(&server, "/public/css/", &["fonts/", "site.css", "../css/"]).await;
        serve(&server, "/public/css/fonts/", &["a.woff"]).await;
        server
    }

    fn config(max_depth: usize, workers: usize) -> CrawlConfig {
        let mut config = CrawlConfig {
            max_depth,
            workers,
            retry: RetryPolicy::new(1, Duration::ZERO, Backoff::Fixed),
            ..CrawlConfig::default()
        };
        config.fetch.timeout = Duration::from_secs(2);
        config
    }

    async fn run(config: CrawlConfig, seed: String) -> (Vec<String>, CrawlSummary) {
        let emitter = LineEmitter::new(Vec::new(), OutputFormat::Plain);
        let summary = {
            let ctx = CrawlContext::new(config, Url::parse(&seed).unwrap(), &emitter).unwrap();
            crawl(&ctx).await
        };
        let out = String::from_utf8(emitter.into_inner()).unwrap();
        (out.lines().map(str::to_string).collect(), summary)
    }

    #[tokio::test]
    async fn test_public_tree_sequential_order() {
        let server = public_tree().await;
        let base = server.uri();
        let (lines, summary) = run(config(8, 1), format!("{}/public/", base)).await;

        let expected: Vec<String> = [
            "/public/",
            "/public/css/",
            "/public/app.js",
            "/public/css/fonts/",
            "/public/css/site.css",
            "/public/css/fonts/a.woff",
        ]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();

        assert_eq!(lines, expected);
        assert_eq!(summary.emitted, 6);
        assert_eq!(summary.directories, 2);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.listed, 3);
        assert_eq!(summary.unreachable, 0);
        assert!(summary.seed_reachable);
    }

    #[tokio::test]
    async fn test_output_is_unique_and_contained() {
        let server = public_tree().await;
        let seed = format!("{}/public/", server.uri());
        let (lines, _) = run(config(8, 4), seed.clone()).await;

        let unique: HashSet<&String> = lines.iter().collect();
        assert_eq!(unique.len(), lines.len());
        assert!(lines.iter().all(|l| l.starts_with(&seed)));
    }

    #[tokio::test]
    async fn test_repeated_crawls_agree() {
        let server = public_tree().await;
        let seed = format!("{}/public/", server.uri());

        let (sequential, _) = run(config(8, 1), seed.clone()).await;
        let (concurrent, _) = run(config(8, 4), seed.clone()).await;
        let (again, _) = run(config(8, 1), seed).await;

        let as_set = |v: &Vec<String>| v.iter().cloned().collect::<HashSet<String>>();
        assert_eq!(as_set(&sequential), as_set(&concurrent));
        assert_eq!(sequential, again);
    }

    #[tokio::test]
    async fn test_max_depth_zero_emits_only_seed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(nginx_page("/public/", &["a.txt"]), "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let seed = format!("{}/public/", server.uri());
        let (lines, summary) = run(config(0, 1), seed.clone()).await;
        assert_eq!(lines, vec![seed]);
        assert_eq!(summary.leaves, 1);
    }

    #[tokio::test]
    async fn test_directory_at_limit_is_emitted_not_listed() {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["css/", "app.js"]).await;
        Mock::given(method("GET"))
            .and(path("/public/css/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let (lines, _) = run(config(1, 1), format!("{}/public/", base)).await;
        assert_eq!(
            lines,
            vec![
                format!("{}/public/", base),
                format!("{}/public/css/", base),
                format!("{}/public/app.js", base),
            ]
        );
    }

    #[tokio::test]
    async fn test_self_and_parent_links_terminate() {
        let server = MockServer::start().await;
        serve(&server, "/loop/", &[".", "./", "../", "/loop/", "../loop/", "/"]).await;

        let seed = format!("{}/loop/", server.uri());
        let (lines, summary) = run(config(8, 2), seed.clone()).await;
        assert_eq!(lines, vec![seed]);
        assert_eq!(summary.listed, 1);
    }

    #[tokio::test]
    async fn test_dedupe_toggle() {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["app.js", "app.js"]).await;
        let seed = format!("{}/public/", server.uri());
        let app_js = format!("{}/public/app.js", server.uri());

        let (deduped, _) = run(config(8, 1), seed.clone()).await;
        assert_eq!(deduped.iter().filter(|l| **l == app_js).count(), 1);

        let no_dedupe = CrawlConfig { dedupe: false, ..config(8, 1) };
        let (raw, _) = run(no_dedupe, seed).await;
        assert_eq!(raw.iter().filter(|l| **l == app_js).count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_subtree_does_not_stop_crawl() {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["broken/", "ok/"]).await;
        serve(&server, "/public/ok/", &["file.txt"]).await;
        Mock::given(method("GET"))
            .and(path("/public/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let (lines, summary) = run(config(8, 1), format!("{}/public/", base)).await;
        assert!(lines.contains(&format!("{}/public/broken/", base)));
        assert!(lines.contains(&format!("{}/public/ok/file.txt", base)));
        assert_eq!(summary.unreachable, 1);
        assert!(summary.seed_reachable);
    }

    #[tokio::test]
    async fn test_seed_unreachable_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let seed = format!("{}/missing/", server.uri());
        let (lines, summary) = run(config(8, 1), seed.clone()).await;
        assert_eq!(lines, vec![seed]);
        assert!(!summary.seed_reachable);
    }

    #[tokio::test]
    async fn test_non_listing_is_leaf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("plain text", "text/plain"))
            .mount(&server)
            .await;

        let seed = format!("{}/public/", server.uri());
        let (lines, summary) = run(config(8, 1), seed.clone()).await;
        assert_eq!(lines, vec![seed]);
        assert_eq!(summary.leaves, 1);
        assert!(summary.seed_reachable);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_emits_nothing() {
        let server = public_tree().await;
        let emitter = LineEmitter::new(Vec::new(), OutputFormat::Plain);
        let summary = {
            let seed = Url::parse(&format!("{}/public/", server.uri())).unwrap();
            let ctx = CrawlContext::new(config(8, 1), seed, &emitter).unwrap();
            ctx.cancel();
            crawl(&ctx).await
        };
        assert!(summary.cancelled);
        assert_eq!(summary.emitted, 0);
        assert!(emitter.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_away_from_directory_is_leaf() {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["x/", "y/", "app.js"]).await;
        Mock::given(method("GET"))
            .and(path("/public/x/"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/elsewhere/"))
            .mount(&server)
            .await;
        serve(&server, "/elsewhere/", &["leak.txt", "deeper/"]).await;
        Mock::given(method("GET"))
            .and(path("/public/y/"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/public/y.bin"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/public/y.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(nginx_page("/public/", &["z.txt"]), "text/html"))
            .mount(&server)
            .await;

        let base = server.uri();
        let (lines, summary) = run(config(8, 1), format!("{}/public/", base)).await;
        assert_eq!(
            lines,
            vec![
                format!("{}/public/", base),
                format!("{}/public/x/", base),
                format!("{}/public/y/", base),
                format!("{}/public/app.js", base),
            ]
        );
        assert_eq!(summary.listed, 1);
        assert_eq!(summary.leaves, 2);
    }

    #[tokio::test]
    async fn test_cancel_while_listing_stops_further_output() {
        let server = MockServer::start().await;
        serve(&server, "/public/", &["css/", "app.js"]).await;
        Mock::given(method("GET"))
            .and(path("/public/css/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(nginx_page("/public/css/", &["fonts/", "site.css"]), "text/html")
                    .set_delay(Duration::from_millis(1000)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/public/css/fonts/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let emitter = LineEmitter::new(Vec::new(), OutputFormat::Plain);
        let summary = {
            let seed = Url::parse(&format!("{}/public/", base)).unwrap();
            let ctx = CrawlContext::new(config(8, 1), seed, &emitter).unwrap();
            let (summary, ()) = tokio::join!(crawl(&ctx), async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ctx.cancel();
            });
            summary
        };

        let out = String::from_utf8(emitter.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                format!("{}/public/", base),
                format!("{}/public/css/", base),
                format!("{}/public/app.js", base),
            ]
        );
        assert!(summary.cancelled);
        assert_eq!(summary.listed, 2);
    }

    // Accepts `capacity` records, then behaves like a closed pipe
    struct ClosedPipe {
        capacity: usize,
        accepted: std::sync::Mutex<Vec<String>>,
    }

    impl Emitter for ClosedPipe {
        fn emit(&self, discovery: &Discovery) -> io::Result<()> {
            let mut accepted = self.accepted.lock().unwrap();
            if accepted.len() >= self.capacity {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            accepted.push(discovery.url.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_closed_output_stops_crawl() {
        let server = public_tree().await;
        let emitter = ClosedPipe { capacity: 2, accepted: std::sync::Mutex::new(Vec::new()) };
        let summary = {
            let seed = Url::parse(&format!("{}/public/", server.uri())).unwrap();
            let ctx = CrawlContext::new(config(8, 1), seed, &emitter).unwrap();
            crawl(&ctx).await
        };

        assert!(summary.cancelled);
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.listed, 1);
        assert_eq!(emitter.accepted.lock().unwrap().len(), 2);
    }
}
