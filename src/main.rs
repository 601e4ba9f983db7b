// src/main.rs
// =============================================================================
// This is the entry point of the dirranger CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up diagnostics on stderr (tracing), or silence them with --quiet
// 3. Turn the starting URL into a directory URL and run the crawl
// 4. Exit with proper code:
//    0 = crawl ran (some subtrees may have been unreachable)
//    1 = the starting URL itself could not be fetched
//    2 = bad arguments or internal error
//
// stdout only ever carries discovered URLs.
// =============================================================================

mod cli;
mod config;
mod crawl;
mod error;
mod fetch;
mod listing;
mod output;
mod urls;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use output::LineEmitter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Fatal errors are printed even in quiet mode
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Diagnostics always go to stderr so stdout stays pipeable.
// RUST_LOG, when set, wins over -v.
fn init_tracing(quiet: bool, verbose: u8) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = cli.to_config()?;
    let seed = urls::directory_seed(&cli.url)?;

    let emitter = LineEmitter::new(std::io::stdout(), cli.output_format());
    let ctx = crawl::CrawlContext::new(config, seed, &emitter).context("Failed to build HTTP client")?;

    // Ctrl-C stops handing out new directories; requests already in flight
    // finish (bounded by the timeout) and the crawl returns normally
    let crawl = crawl::crawl(&ctx);
    tokio::pin!(crawl);
    let summary: crawl::CrawlSummary = tokio::select! {
        summary = &mut crawl => summary,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, finishing in-flight requests");
            ctx.cancel();
            crawl.await
        }
    };

    if !summary.seed_reachable {
        warn!(seed = %ctx.seed(), "starting URL could not be fetched");
        return Ok(1);
    }

    info!(
        emitted = summary.emitted,
        unreachable = summary.unreachable,
        malformed = summary.malformed,
        cancelled = summary.cancelled,
        "done"
    );
    Ok(0)
}
