// src/urls.rs
// =============================================================================
// URL helpers shared by the parser and the crawl engine.
//
// - normalize: the one canonical form used for comparison and dedup
// - same_origin: host + effective port comparison
// - Scope: "is this URL inside the tree we were asked to crawl?"
// - directory_seed: turns the user's starting URL into a directory URL
// =============================================================================

use anyhow::{bail, Context, Result};
use url::Url;

/// Canonical form of a URL.
///
/// `Url::parse` already lower-cases scheme and host, drops default ports and
/// resolves `.`/`..` segments. On top of that we drop the fragment and
/// collapse repeated slashes in the path. Percent-encoding is left alone.
pub fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    if url.path().contains("//") {
        let mut collapsed = String::with_capacity(url.path().len());
        let mut previous_slash = false;
        for c in url.path().chars() {
            if c == '/' && previous_slash {
                continue;
            }
            previous_slash = c == '/';
            collapsed.push(c);
        }
        url.set_path(&collapsed);
    }

    url
}

/// String key used by the visited set
pub fn canonical(url: &Url) -> String {
    normalize(url).into()
}

/// Compares host and effective port, so `example.com` and `example.com:80`
/// are the same place
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// True when `child` sits strictly below the directory `dir`.
/// The directory itself, its parents and its siblings are all outside.
pub fn is_strictly_below(child: &Url, dir: &Url) -> bool {
    same_origin(child, dir) && child.path() != dir.path() && child.path().starts_with(dir.path())
}

/// The subtree a crawl is allowed to touch
#[derive(Debug, Clone)]
pub struct Scope {
    root: Url,
}

impl Scope {
    /// `root` must be a directory URL (trailing slash)
    pub fn new(root: Url) -> Self {
        Self { root }
    }

    /// The root itself counts as inside
    pub fn contains(&self, url: &Url) -> bool {
        same_origin(url, &self.root) && url.path().starts_with(self.root.path())
    }
}

/// Parses the starting URL and turns it into a directory URL:
/// http(s) only, no query or fragment, trailing slash enforced.
pub fn directory_seed(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("Invalid URL '{}'", raw))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Unsupported scheme '{}' (expected http or https)", parsed.scheme());
    }
    if parsed.host_str().is_none() {
        bail!("URL has no host: {}", raw);
    }

    let mut url = normalize(&parsed);
    url.set_query(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
