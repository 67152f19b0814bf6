//! Blocking HTTP client with configurable politeness (delay between requests) and opt-in retries.

use super::error::ScraperError;
use super::Fetch;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; web2reader/0.1; +https://github.com/web2reader)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 1;
const MAX_REDIRECTS: usize = 10;

/// Default number of attempts: a single try, failures are not retried unless configured.
const DEFAULT_RETRY_COUNT: u32 = 1;
/// Backoff for HTTP 429 (rate limit): wait longer so the server can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET request, retrying timeouts, connection errors, 5xx and 429 up to the
    /// configured attempt count. The final response is returned whatever its status.
    pub fn get_with_retry(
        &mut self,
        url: &str,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let max_attempts = self.retry_count.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let is_last = attempt >= max_attempts;
            self.wait_delay();
            let result = self.inner.get(url).send();
            self.last_request = Some(Instant::now());
            match result {
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if !retryable || is_last {
                        return Ok(response);
                    }
                    let backoff = if status.as_u16() == 429 {
                        step(&BACKOFF_429_SECS, attempt)
                    } else {
                        step(&self.backoff_secs, attempt)
                    };
                    debug!(url, status = status.as_u16(), backoff, "retrying after HTTP error");
                    std::thread::sleep(Duration::from_secs(backoff));
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if !retryable || is_last {
                        return Err(e);
                    }
                    let backoff = step(&self.backoff_secs, attempt);
                    debug!(url, error = %e, backoff, "retrying after network error");
                    std::thread::sleep(Duration::from_secs(backoff));
                }
            }
        }
    }

    fn get_checked(
        &mut self,
        url: &str,
        context: Option<&str>,
    ) -> Result<reqwest::blocking::Response, ScraperError> {
        let response = self
            .get_with_retry(url)
            .map_err(|e| ScraperError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                context: context.map(String::from),
            });
        }
        Ok(response)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Backoff for the given 1-based attempt; the last value is reused past the end.
fn step(backoff: &[u64], attempt: u32) -> u64 {
    let idx = (attempt as usize).saturating_sub(1);
    backoff
        .get(idx)
        .or_else(|| backoff.last())
        .copied()
        .unwrap_or(1)
}

impl Fetch for PoliteClient {
    fn fetch_text(&mut self, url: &str, context: &str) -> Result<String, ScraperError> {
        debug!(url, context, "fetching page");
        let response = self.get_checked(url, Some(context))?;
        response.text().map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })
    }

    fn fetch_bytes(&mut self, url: &str) -> Result<Vec<u8>, ScraperError> {
        debug!(url, "fetching bytes");
        let response = self.get_checked(url, None)?;
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ScraperError::BodyRead {
                url: url.to_string(),
                source: e,
            })
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, timeout, and retry settings.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: Vec::new(),
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 1.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set number of HTTP attempts for transient failures (default 1, i.e. no retries).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Backoff delays in seconds before each retry (e.g. [1, 2, 4]). If shorter than
    /// retry_count - 1, the last value is reused.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            // Exponential: 1, 2, 4, ... for (retry_count - 1) steps
            let n = self.retry_count.saturating_sub(1) as usize;
            (0..n).map(|i| 1u64 << i.min(4)).collect::<Vec<_>>()
        } else {
            self.retry_backoff_secs
        };
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}
