use crate::config::FetchConfig;
use crate::types::{DigestError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Shared HTTP client for every source and article page of a run.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Fetches `url` and returns the decoded body.
    ///
    /// Transport errors, `429` and `5xx` responses are retried with
    /// exponential backoff up to `max_retries` times. Any other non-success
    /// status fails immediately.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds.max(1) * 32),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            self.apply_rate_limit(url).await?;

            let err = match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "Fetched page");
                    return Ok(body);
                }
                Err(e) => e,
            };

            if attempt >= self.config.max_retries || !is_retryable(&err) {
                return Err(err);
            }
            attempt += 1;

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| Duration::from_secs(self.config.retry_delay_seconds));
            warn!(url = %url, attempt, error = %err, "Fetch failed, retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(DigestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_page_size_mb {
                return Err(DigestError::PageTooLarge { size_mb });
            }
        }

        Ok(response.text().await?)
    }

    /// Reserves the next request slot for the URL's host and waits for it.
    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let min_interval = Duration::from_millis(self.config.min_host_interval_ms);
        if min_interval.is_zero() {
            return Ok(());
        }

        let host = Url::parse(url)?.host_str().unwrap_or("").to_string();
        let now = Instant::now();

        let slot = {
            let mut rate_limiter = self.rate_limiter.lock().await;
            let slot = match rate_limiter.get(&host) {
                Some(last) if *last + min_interval > now => *last + min_interval,
                _ => now,
            };
            rate_limiter.insert(host.clone(), slot);
            slot
        };

        if slot > now {
            debug!(host = %host, "Rate limiting: waiting {:?}", slot - now);
            tokio::time::sleep_until(slot.into()).await;
        }

        Ok(())
    }
}

fn is_retryable(err: &DigestError) -> bool {
    match err {
        DigestError::Http(_) => true,
        DigestError::HttpStatus { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_errors() {
        let server_error = DigestError::HttpStatus { url: "http://x".into(), status: 503 };
        let throttled = DigestError::HttpStatus { url: "http://x".into(), status: 429 };
        let not_found = DigestError::HttpStatus { url: "http://x".into(), status: 404 };

        assert!(is_retryable(&server_error));
        assert!(is_retryable(&throttled));
        assert!(!is_retryable(&not_found));
        assert!(!is_retryable(&DigestError::Parse("bad".into())));
    }

    #[tokio::test]
    async fn rate_limit_spaces_requests_to_same_host() {
        let fetcher = Fetcher::new(FetchConfig {
            min_host_interval_ms: 50,
            ..FetchConfig::default()
        })
        .unwrap();

        let start = Instant::now();
        fetcher.apply_rate_limit("http://example.com/a").await.unwrap();
        fetcher.apply_rate_limit("http://example.com/b").await.unwrap();
        fetcher.apply_rate_limit("http://other.example/a").await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(100));
    }
}
