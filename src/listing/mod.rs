// src/listing/mod.rs
// =============================================================================
// This module turns an autoindex page into a list of child entries.
//
// How it works:
// 1. Make sure the response is HTML at all (content-type or body prefix)
// 2. Parse it with scraper and ask each ListingFormat, in priority order,
//    whether it recognizes the page (see format.rs)
// 3. Run the winning format's anchors through the same extraction rules:
//    resolve against the page URL, drop anything that is not strictly below
//    the current directory, classify directory vs file by trailing slash
//
// The parser is stateless apart from one switch: whether duplicate anchors on
// a page collapse into one entry.
// =============================================================================

mod format;

pub use format::ListingFormat;

use crate::urls::{is_strictly_below, normalize};
use format::Anchor;
use scraper::Html;
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// Directory or leaf, decided purely by the trailing slash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One child of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Human readable name (anchor text, or the decoded last path segment)
    pub name: String,
    /// Absolute URL, original percent-encoding preserved
    pub url: Url,
    pub kind: EntryKind,
}

/// An href that could not be resolved against the page URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedHref {
    pub href: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub format: ListingFormat,
    pub entries: Vec<Entry>,
    pub malformed: Vec<MalformedHref>,
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Listing(Listing),
    /// Not HTML, empty, or no known listing markup. Not an error.
    NotAListing,
}

// Bodies without a content-type still count as HTML if they start like it
const HTML_PREFIXES: [&str; 7] = ["<!doctype html", "<html", "<head", "<title", "<pre", "<table", "<h1"];

#[derive(Debug, Clone, Default)]
pub struct ListingParser {
    keep_duplicates: bool,
}

impl ListingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep repeated anchors on a page instead of collapsing them
    pub fn keep_duplicates(mut self, keep: bool) -> Self {
        self.keep_duplicates = keep;
        self
    }

    /// Parses the listing found at `base` (a directory URL)
    pub fn parse(&self, base: &Url, body: &str, content_type: Option<&str>) -> ParseOutcome {
        if !looks_like_html(body, content_type) {
            return ParseOutcome::NotAListing;
        }

        let document = Html::parse_document(body);
        let base = normalize(base);

        for format in ListingFormat::PRIORITY {
            if let Some(anchors) = format.try_parse(&document) {
                return ParseOutcome::Listing(self.extract(format, &base, anchors));
            }
        }

        ParseOutcome::NotAListing
    }

    fn extract(&self, format: ListingFormat, base: &Url, anchors: Vec<Anchor>) -> Listing {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut malformed = Vec::new();

        for anchor in anchors {
            let href = anchor.href.trim();

            // Empty links, column sort links (?C=N;O=D) and in-page anchors
            if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
                continue;
            }

            let resolved = match base.join(href) {
                Ok(url) => normalize(&url),
                Err(e) => {
                    malformed.push(MalformedHref {
                        href: href.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }

            // Parent links, self links, navigation and other sites all fail this
            if !is_strictly_below(&resolved, base) {
                continue;
            }

            if !self.keep_duplicates && !seen.insert(resolved.as_str().to_string()) {
                continue;
            }

            let kind = if resolved.path().ends_with('/') {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let name = display_name(&anchor.text, &resolved);

            entries.push(Entry { name, url: resolved, kind });
        }

        Listing { format, entries, malformed }
    }
}

fn looks_like_html(body: &str, content_type: Option<&str>) -> bool {
    if body.trim().is_empty() {
        return false;
    }

    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html")) {
        return true;
    }

    let head: String = body.trim_start().chars().take(16).collect::<String>().to_ascii_lowercase();
    HTML_PREFIXES.iter().any(|prefix| head.starts_with(prefix))
}

// nginx truncates long names to "averyveryverylongna..>", so the text is
// only trusted when it is complete
fn display_name(text: &str, url: &Url) -> String {
    let text = text.trim();
    if !text.is_empty() && !text.ends_with("..>") {
        return text.to_string();
    }

    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();

    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why drop everything that is not strictly below the page?
//    - "Parent Directory", "../" and "." would walk us back up the tree
//    - Some themes add navigation links ("/", "/about/")
//    - Comparing paths after resolution catches all of these with one rule,
//      including cycles that don't spell out "../"
//
// 2. Why keep the original percent-encoding in the URL?
//    - The server produced it; decoding and re-encoding could change bytes
//      and break the next fetch. Only the display name is decoded.
// -----------------------------------------------------------------------------
