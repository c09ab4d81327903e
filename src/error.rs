//! Typed errors for the seams where callers branch on the failure kind.
//!
//! Everything else in the crate uses `anyhow` with context.

use thiserror::Error;

/// Failures talking to the Slack Web API.
#[derive(Error, Debug)]
pub enum SlackError {
    #[error("Slack request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered `{"ok": false, "error": ...}`.
    #[error("Slack API error in {method}: {message}")]
    Api { method: String, message: String },

    #[error("Slack channel not found: {0}")]
    ChannelNotFound(String),
}

/// Failures from the metadata model, classified for the retry policy.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The service could not be reached (connect, timeout, dropped body).
    #[error("model service unreachable: {0}")]
    Connection(String),

    /// HTTP 429.
    #[error("model rate limit reached: {0}")]
    RateLimited(String),

    /// Any other non-success status.
    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response arrived but could not be understood. Not retried.
    #[error("unexpected model response: {0}")]
    Unexpected(String),
}

/// Per-file text extraction failure. Never escapes the extractor.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("PDF parser panicked")]
    Panicked,
}
