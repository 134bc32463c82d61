//! Error types for scraping the Kibana status API.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using [`ScrapeError`].
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors that can occur during a single scrape of the Kibana status API.
///
/// All variants are recoverable: a failed scrape is logged and the next pull
/// simply tries again.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request could not be built (malformed URL, invalid header).
    #[error("could not initialize a request to scrape metrics: {0}")]
    RequestConstruction(String),

    /// The network round-trip failed (DNS, connection refused, TLS, timeout).
    #[error("error while reading Kibana status: {0}")]
    Transport(#[source] reqwest::Error),

    /// Kibana answered with something other than `200 OK`.
    #[error("invalid response from Kibana status: {status}")]
    UnexpectedStatus { status: StatusCode },

    /// The response body could not be read to the end.
    #[error("error while reading response from Kibana status: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// The body is not JSON, or not the expected shape.
    #[error("error while decoding Kibana status: {source}\nProblematic content:\n{body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl ScrapeError {
    /// Create a request construction error.
    pub fn request_construction(err: impl std::fmt::Display) -> Self {
        Self::RequestConstruction(err.to_string())
    }

    /// Short classification used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::RequestConstruction(_) => "request_construction",
            ScrapeError::Transport(_) => "transport",
            ScrapeError::UnexpectedStatus { .. } => "unexpected_status",
            ScrapeError::BodyRead(_) => "body_read",
            ScrapeError::Decode { .. } => "decode",
        }
    }
}
