//! Shared error type for fetching and extracting pages.

use thiserror::Error;

/// Errors from the HTTP client and the page extractors.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Optional context (e.g. "listing page", "chapter 5") for programmatic use.
        context: Option<String>,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("Could not parse page: {message}")]
    Parse { message: String },

    #[error("Listing page has no volume headings with chapter links.")]
    NoVolumes,
}

impl ScraperError {
    /// True for failures of the remote side (network, status, body) rather than of the markup.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ScraperError::Network { .. }
                | ScraperError::HttpStatus { .. }
                | ScraperError::BodyRead { .. }
        )
    }
}
