//! Failure taxonomy for a scrape run.
//!
//! Every failure the core can produce is one of the [`ScrapeError`] variants.
//! Callers match on them exhaustively: transient failures are absorbed by the
//! transport's retry loop, terminal ones end the run, and validation failures
//! never reach the network at all.

use thiserror::Error;

/// All failure kinds produced by query validation and the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// Timeout, connection error, or an HTTP status outside the special-cased set.
    #[error("transient failure: {0}")]
    Transient(String),

    /// HTTP 429 from the target.
    #[error("rate limited by the listing endpoint (HTTP 429)")]
    RateLimited,

    /// HTTP 403 from the target.
    #[error("access blocked by the listing endpoint (HTTP 403)")]
    AccessBlocked,

    /// TLS handshake or certificate validation failed.
    #[error("secure channel failure: {0}")]
    SecureChannelFailure(String),

    /// The reachability probe could not reach any public endpoint.
    #[error("no internet connection detected")]
    NoConnectivity,

    /// Malformed search input, rejected before any request is made.
    #[error("invalid search query: {0}")]
    Validation(String),
}

impl ScrapeError {
    /// Terminal failures end the run instead of being retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScrapeError::RateLimited
                | ScrapeError::AccessBlocked
                | ScrapeError::SecureChannelFailure(_)
                | ScrapeError::NoConnectivity
        )
    }

    /// Short stable name used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Transient(_) => "transient",
            ScrapeError::RateLimited => "rate_limited",
            ScrapeError::AccessBlocked => "access_blocked",
            ScrapeError::SecureChannelFailure(_) => "secure_channel_failure",
            ScrapeError::NoConnectivity => "no_connectivity",
            ScrapeError::Validation(_) => "validation",
        }
    }

    /// Guidance for the person running the scrape.
    pub fn advice(&self) -> &'static str {
        match self {
            ScrapeError::Transient(_) => "The request failed temporarily. Try again shortly.",
            ScrapeError::RateLimited => {
                "Requests are being rate-limited. Wait 5-10 minutes before trying again, \
                 and reduce the job count or increase the delay between requests."
            }
            ScrapeError::AccessBlocked => {
                "Requests are being refused (403). This usually follows too many requests \
                 in a short time or a temporary IP block. Try again later."
            }
            ScrapeError::SecureChannelFailure(_) => {
                "Certificate verification failed. Update the system's root certificates \
                 and check for intercepting proxies."
            }
            ScrapeError::NoConnectivity => {
                "No internet connection detected. Check your network connection and try again."
            }
            ScrapeError::Validation(_) => "Fix the search parameters and run again.",
        }
    }
}

/// A single candidate element that could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("listing link {href:?} does not resolve to a valid URL: {reason}")]
    InvalidUrl { href: String, reason: String },
}
