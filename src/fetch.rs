use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::warn;
use url::Url;

use crate::error::FetchError;
use crate::throttle::Throttle;

/// Politeness-gated HTTP fetcher. Every request waits for a throttle slot;
/// transport errors and 429/5xx responses are retried with exponential
/// backoff up to `max_retries` times.
pub struct Fetcher {
    client: reqwest::Client,
    throttle: Throttle,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    pub fn new(
        client: reqwest::Client,
        throttle: Throttle,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            client,
            throttle,
            max_retries,
            retry_backoff,
        }
    }

    /// Fetch a page body. The returned error is terminal for this URL: the
    /// caller abandons the traversal branch behind it.
    pub async fn get(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            self.throttle.acquire().await;

            let start = Instant::now();
            let result = self.client.get(url.clone()).send().await;
            let latency = start.elapsed();

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        self.throttle.record(latency, true).await;
                        return Ok(resp.text().await?);
                    }
                    self.throttle.record(latency, false).await;
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if !retryable || attempt >= self.max_retries {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                }
                Err(e) => {
                    self.throttle.record(latency, false).await;
                    if attempt >= self.max_retries {
                        return Err(FetchError::Transport(e));
                    }
                }
            }

            let backoff = self.retry_backoff * 2u32.saturating_pow(attempt);
            warn!(
                "retrying {} in {:.1}s (attempt {}/{})",
                url,
                backoff.as_secs_f64(),
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fetcher(max_retries: u32) -> Fetcher {
        let throttle = Throttle::new(
            Duration::ZERO,
            Duration::ZERO,
            Duration::from_secs(60),
            1.0,
        );
        Fetcher::new(reqwest::Client::new(), throttle, max_retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_body("<html>hello</html>")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/page", server.url())).unwrap();
        let body = test_fetcher(2).get(&url).await.unwrap();
        assert_eq!(body, "<html>hello</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn terminal_status_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gone")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/gone", server.url())).unwrap();
        let err = test_fetcher(3).get(&url).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/flaky", server.url())).unwrap();
        let err = test_fetcher(2).get(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { .. }));
        // initial attempt + 2 retries
        mock.assert_async().await;
    }
}
