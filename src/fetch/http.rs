// src/fetch/http.rs
// =============================================================================
// This module performs a single HTTP GET against a listing URL.
//
// Key functionality:
// - One attempt per call, no retries (see retry.rs for that)
// - Sends our identifying User-Agent header
// - Follows redirects and remembers where we ended up
// - Caps the body size so a pathological listing can't eat all memory
// - Sorts reqwest failures into the FetchError taxonomy
// =============================================================================

use crate::config::FetchConfig;
use crate::error::FetchError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// A successful (2xx) response with its body fully read
#[derive(Debug, Clone)]
pub struct Response {
    /// Where the request landed after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Issues single GET requests with a shared connection pool
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl Fetcher {
    // The client is built once and reused for every request (connection pooling)
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Fetches `url` once and returns the decoded body
    pub async fn fetch(&self, url: &Url) -> Result<Response, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| categorize_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // Reject early when the server announces an oversized body
        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(FetchError::BodyTooLarge { limit: self.max_body_bytes });
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Chunked bodies carry no length, so count as we read
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| categorize_error(e, self.timeout))?
        {
            if body.len().saturating_add(chunk.len()) > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge { limit: self.max_body_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Response {
            final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

// Categorizes reqwest errors:
// - timeout anywhere in the exchange
// - TLS/certificate trouble (only visible in the inner error text)
// - connection failures
// - everything else
//
// Only the source chain is searched: reqwest's own message embeds the URL,
// and a path like /pub/openssl/ must not read as a TLS failure.
fn categorize_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout(timeout);
    }

    let sources = source_messages(&error);
    let is_tls = sources.iter().any(|message| {
        let message = message.to_lowercase();
        message.contains("certificate") || message.contains("tls") || message.contains("ssl")
    });
    let is_connect = error.is_connect();

    // The innermost source is the specific one ("connection refused (os error 111)");
    // every outer message already repeats it
    let detail = match sources.last() {
        Some(innermost) => innermost.clone(),
        None => error.without_url().to_string(),
    };

    if is_tls {
        FetchError::Tls(detail)
    } else if is_connect {
        FetchError::ConnectionRefused(detail)
    } else {
        FetchError::Other(detail)
    }
}

fn source_messages(error: &reqwest::Error) -> Vec<String> {
    let mut messages = Vec::new();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    messages
}
