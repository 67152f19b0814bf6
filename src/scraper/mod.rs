//! Fetching and extraction. Shared client, the fetch seam, and the listing/chapter extractors.

mod client;
mod error;

pub mod chapter;
pub mod listing;

pub use chapter::{
    extract_chapter, extract_illustrations, parse_chapter_html, parse_illustrations_html,
    resolve_volume, EmptyChapterBehavior, ResolveOptions,
};
pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::ScraperError;
pub use listing::{extract_listing, fetch_listing};

use reqwest::Url;
use scraper::Selector;

/// Source of remote pages and files. Implemented by [PoliteClient]; tests use an in-memory map.
pub trait Fetch {
    /// GET a page and return its body as text. `context` names the page for error messages.
    fn fetch_text(&mut self, url: &str, context: &str) -> Result<String, ScraperError>;

    /// GET a resource and return the raw body.
    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, ScraperError>;
}

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::Parse {
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_url(input: &str) -> Result<Url, ScraperError> {
    let url = Url::parse(input.trim()).map_err(|e| ScraperError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: "URL has no host".to_string(),
        });
    }
    Ok(url)
}

/// Resolve `href` against `base`; falls back to the raw href when joining fails.
pub(crate) fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(b) => b
            .join(href.trim())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_accepts_http_and_https() -> Result<(), ScraperError> {
        assert_eq!(validate_url("https://example.com/novel/")?.host_str(), Some("example.com"));
        validate_url("http://example.com")?;
        Ok(())
    }

    #[test]
    fn validate_url_rejects_other_schemes() -> Result<(), String> {
        match validate_url("ftp://example.com") {
            Err(ScraperError::InvalidUrl { input, .. }) if input == "ftp://example.com" => Ok(()),
            other => Err(format!("expected InvalidUrl, got {:?}", other)),
        }
    }

    #[test]
    fn validate_url_rejects_malformed_and_empty() {
        assert!(validate_url("htp:/example").is_err());
        assert!(validate_url("").is_err());
        assert!(validate_url("invalid-url").is_err());
    }

    #[test]
    fn resolve_href_joins_relative_links() -> Result<(), ScraperError> {
        let base = validate_url("https://example.com/novel/")?;
        assert_eq!(
            resolve_href(Some(&base), "/v1-ch1/"),
            "https://example.com/v1-ch1/"
        );
        assert_eq!(
            resolve_href(Some(&base), "https://other.org/x"),
            "https://other.org/x"
        );
        assert_eq!(resolve_href(None, "/x"), "/x");
        Ok(())
    }
}
