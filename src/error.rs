// src/error.rs
// =============================================================================
// Typed errors for the network side of the crawler.
//
// FetchError describes why a single GET failed. RetryError describes why the
// retry policy stopped trying. Neither ever aborts a crawl on its own: the
// traversal engine turns them into "this node is unreachable" and moves on.
//
// Only the application boundary (main.rs, config validation) uses anyhow.
// =============================================================================

use std::time::Duration;
use thiserror::Error;

/// Why a single fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request (connect, headers or body) did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The TCP connection could not be established
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Certificate or handshake problem
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server answered with a non-2xx status
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body crossed the configured ceiling
    #[error("body larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Anything reqwest reports that fits none of the above
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Transient failures are worth another attempt; everything else is an
    /// answer from the server (or from us) that will not change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::ConnectionRefused(_))
    }
}

/// Why the retry policy stopped
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed with a transient error
    #[error("gave up after {attempts} attempt(s): {last}")]
    GaveUp { attempts: u32, last: FetchError },

    /// A non-transient failure, returned on the attempt that produced it
    #[error("{0}")]
    Rejected(FetchError),
}

impl RetryError {
    /// The error that ended the last attempt
    pub fn last_error(&self) -> &FetchError {
        match self {
            RetryError::GaveUp { last, .. } => last,
            RetryError::Rejected(err) => err,
        }
    }
}
