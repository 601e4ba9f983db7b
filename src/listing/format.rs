// src/listing/format.rs
// =============================================================================
// Recognizes which server generated an autoindex page.
//
// Each format is a tagged variant with two parts:
// - evidence: markup only that server produces (icon alt text, table summary,
//   an "Index of" heading above a <pre> block, ...)
// - anchors: the CSS selector that picks the listing's links out of the page
//
// Formats are tried in PRIORITY order and the first one with evidence and at
// least one usable anchor wins.
// =============================================================================

use scraper::{ElementRef, Html, Selector};

/// An <a> element pulled out of a listing, before any URL work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    /// mod_autoindex: <table> or <pre> rows with [DIR]/[   ] icon markers
    Apache,
    /// autoindex on: bare anchors inside a <pre> under "Index of"
    Nginx,
    /// mod_dirlisting: <table summary="Directory Listing"> with td.n cells
    Lighttpd,
    /// Anything else that calls itself "Index of" (dufs, python -m http.server, ...)
    Generic,
}

impl ListingFormat {
    pub const PRIORITY: [ListingFormat; 4] = [
        ListingFormat::Apache,
        ListingFormat::Nginx,
        ListingFormat::Lighttpd,
        ListingFormat::Generic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListingFormat::Apache => "apache",
            ListingFormat::Nginx => "nginx",
            ListingFormat::Lighttpd => "lighttpd",
            ListingFormat::Generic => "generic",
        }
    }

    /// Returns the listing's anchors if this format's markup is present
    pub fn try_parse(self, document: &Html) -> Option<Vec<Anchor>> {
        if !self.detect(document) {
            return None;
        }

        let anchors = collect_anchors(document, self.anchor_selector());
        if anchors.iter().any(|a| !a.href.trim().is_empty()) {
            Some(anchors)
        } else {
            None
        }
    }

    fn detect(self, document: &Html) -> bool {
        match self {
            ListingFormat::Apache => {
                has_icon_markers(document)
                    || select_text(document, "address").any(|t| t.contains("Apache"))
            }
            ListingFormat::Nginx => has_index_of_heading(document) && exists(document, "pre a[href]"),
            ListingFormat::Lighttpd => {
                exists(document, r#"table[summary="Directory Listing"]"#)
                    || exists(document, "div.list table")
                    || exists(document, "td.n a[href]")
            }
            ListingFormat::Generic => {
                has_listing_heading(document)
                    || select_text(document, "th").any(|t| t.trim().eq_ignore_ascii_case("name"))
                    || has_pre_column_header(document)
            }
        }
    }

    fn anchor_selector(self) -> &'static str {
        match self {
            ListingFormat::Apache => "table a[href], pre a[href], ul a[href]",
            ListingFormat::Nginx => "pre a[href]",
            ListingFormat::Lighttpd => {
                r#"td.n a[href], table[summary="Directory Listing"] a[href]"#
            }
            ListingFormat::Generic => "a[href]",
        }
    }
}

// Selectors are constants; a parse failure just means "no match"
fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn exists(document: &Html, css: &str) -> bool {
    selector(css).is_some_and(|s| document.select(&s).next().is_some())
}

fn select_text<'a>(document: &'a Html, css: &str) -> impl Iterator<Item = String> + 'a {
    let elements: Vec<ElementRef<'a>> = match selector(css) {
        Some(s) => document.select(&s).collect(),
        None => Vec::new(),
    };
    elements.into_iter().map(|e| e.text().collect::<String>())
}

fn collect_anchors(document: &Html, css: &str) -> Vec<Anchor> {
    let Some(selector) = selector(css) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            Some(Anchor {
                href: href.trim().to_string(),
                text: element.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

// Apache icons carry alt text like "[DIR]", "[TXT]", "[   ]"
fn has_icon_markers(document: &Html) -> bool {
    let Some(selector) = selector("img[alt]") else {
        return false;
    };
    document.select(&selector).any(|img| {
        img.value()
            .attr("alt")
            .map(str::trim)
            .is_some_and(|alt| alt.len() >= 2 && alt.starts_with('[') && alt.ends_with(']'))
    })
}

// <title> or any <hN> beginning with "Index of"
fn has_index_of_heading(document: &Html) -> bool {
    has_heading_prefix(document, &["index of"])
}

// python -m http.server says "Directory listing for /path/" instead
fn has_listing_heading(document: &Html) -> bool {
    has_heading_prefix(document, &["index of", "directory listing for"])
}

fn has_heading_prefix(document: &Html, prefixes: &[&str]) -> bool {
    select_text(document, "title, h1, h2, h3, h4, h5, h6").any(|text| {
        let text = text.trim_start();
        prefixes.iter().any(|prefix| {
            text.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    })
}

// A <pre> header row such as "Name    Last modified    Size"
fn has_pre_column_header(document: &Html) -> bool {
    select_text(document, "pre").any(|text| {
        let words: Vec<String> = text
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();
        words
            .windows(3)
            .any(|w| w[0] == "name" && w[1] == "last" && w[2] == "modified")
    })
}
