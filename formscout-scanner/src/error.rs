use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Failure of a single driver operation. The crawl recovers from every variant by
/// abandoning the branch that caused it.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("navigation to {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("resource {url} blocked ({content_type})")]
    Blocked { url: String, content_type: String },

    #[error("document {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("script evaluation is not supported by this driver")]
    ScriptUnsupported,

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("no document loaded")]
    NoDocument,

    #[error("no login form found at {0}")]
    NoLoginForm(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
